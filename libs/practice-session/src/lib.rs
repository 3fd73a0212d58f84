//! Practice-session state machine and grading pipeline.
//!
//! The session keeps per-question code buffers and result caches while the
//! learner moves through a question list; the pipeline assembles hidden and
//! sample cases into a grading request, sends it to the remote grader, and
//! scores what comes back.

pub mod assembler;
pub mod classifier;
pub mod error;
pub mod grading;
pub mod pipeline;
pub mod progress;
pub mod session;
pub mod store;

pub use assembler::{assemble, build_request, CustomInput};
pub use classifier::{classify, Classified, Verdict};
pub use error::PracticeError;
pub use grading::{GradingService, HttpGradingService};
pub use pipeline::{ensure_question_loaded, GradingPipeline, SubmitOutcome};
pub use progress::{awarded_score, progress_for, progress_for_list, submission_record, QuestionProgress};
pub use session::{ActiveView, ApplyResult, PracticeSession, SlotKey, SubmissionTicket};
pub use store::{HttpBackend, MemoryStore, ProgressStore, QuestionStore, RedisProgressStore};
