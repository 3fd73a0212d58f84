use practice_common::types::{GradingResult, Question, ResultGroup};
use serde::Serialize;
use std::collections::HashMap;

use crate::classifier::Classified;

//
// ─── KEYS & SLOTS ──────────────────────────────────────────────────────────────
//

/// Identity of a question's state within one session.
///
/// Questions with an identifier share state by identifier; questions without
/// one get a key scoped to their position in the list.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum SlotKey {
    Id(String),
    Anonymous(usize),
}

impl SlotKey {
    fn for_question(question: &Question, position: usize) -> Self {
        match &question.id {
            Some(id) => SlotKey::Id(id.clone()),
            None => SlotKey::Anonymous(position),
        }
    }
}

/// Cached state of one question.
#[derive(Debug, Clone, Default)]
struct Slot {
    code: Option<String>,
    raw: Option<Vec<GradingResult>>,
    custom: Option<ResultGroup>,
    graded: Option<ResultGroup>,
    latest_token: Option<u64>,
    awaiting: bool,
}

/// Proof that a submission was started; hands the response back to the
/// question it was issued for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionTicket {
    pub key: SlotKey,
    pub index: usize,
    pub token: u64,
    generation: u64,
}

/// What happened to a grading response handed back to the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplyResult {
    Applied,
    /// A newer submit for the same question was issued meanwhile
    Superseded,
    /// The question list was replaced after the submit was issued
    Discarded,
}

//
// ─── ACTIVE VIEW ───────────────────────────────────────────────────────────────
//

/// The slice of session state the presentation layer renders.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ActiveView {
    pub index: usize,
    pub question_id: Option<String>,
    pub code: String,
    /// Grader results as returned, before grouping
    pub raw: Vec<GradingResult>,
    pub custom: ResultGroup,
    pub graded: ResultGroup,
    pub loading: bool,
}

//
// ─── SESSION ───────────────────────────────────────────────────────────────────
//

/// In-memory state of one practice run.
///
/// Owns the question list, the current position, and per-question code
/// buffers and result caches. Every operation is total: out-of-range indices
/// are ignored rather than reported.
#[derive(Debug, Clone, Default)]
pub struct PracticeSession {
    questions: Vec<Question>,
    keys: Vec<SlotKey>,
    slots: HashMap<SlotKey, Slot>,
    current: usize,
    initial_source: Option<String>,
    view: ActiveView,
    next_token: u64,
    generation: u64,
}

impl PracticeSession {
    /// Start a run over `questions` at `index`.
    ///
    /// `code_map` seeds code buffers by list position, as handed over by the
    /// navigation layer.
    pub fn new(questions: Vec<Question>, index: usize, code_map: HashMap<usize, String>) -> Self {
        let mut session = Self::default();
        session.replace_question_list(questions, index, code_map);
        session
    }

    /// Source shown for any question that has no buffer yet.
    #[must_use]
    pub fn with_initial_source(mut self, source: Option<String>) -> Self {
        self.initial_source = source;
        self.restore_view();
        self
    }

    /// Replace the whole list; previous caches are discarded and responses
    /// issued against the old list will no longer apply.
    pub fn replace_question_list(
        &mut self,
        questions: Vec<Question>,
        index: usize,
        code_map: HashMap<usize, String>,
    ) {
        self.generation += 1;
        self.keys = questions
            .iter()
            .enumerate()
            .map(|(pos, q)| SlotKey::for_question(q, pos))
            .collect();
        self.slots = HashMap::new();
        for (pos, code) in code_map {
            if let Some(key) = self.keys.get(pos) {
                self.slots.entry(key.clone()).or_default().code = Some(code);
            }
        }
        self.questions = questions;
        self.current = if index < self.questions.len() { index } else { 0 };

        tracing::debug!(
            questions = self.questions.len(),
            index = self.current,
            generation = self.generation,
            "Question list replaced"
        );
        self.restore_view();
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    pub fn question(&self, index: usize) -> Option<&Question> {
        self.questions.get(index)
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn current_question(&self) -> Option<&Question> {
        self.question(self.current)
    }

    pub fn view(&self) -> &ActiveView {
        &self.view
    }

    fn slot(&self, index: usize) -> Option<&Slot> {
        self.keys.get(index).and_then(|key| self.slots.get(key))
    }

    /// Code for a question: its buffer, else the initial source, else empty.
    pub fn code_for(&self, index: usize) -> String {
        self.slot(index)
            .and_then(|slot| slot.code.clone())
            .or_else(|| self.initial_source.clone())
            .unwrap_or_default()
    }

    pub fn raw_results(&self, index: usize) -> Option<&[GradingResult]> {
        self.slot(index).and_then(|slot| slot.raw.as_deref())
    }

    pub fn custom_results(&self, index: usize) -> Option<&ResultGroup> {
        self.slot(index).and_then(|slot| slot.custom.as_ref())
    }

    pub fn graded_results(&self, index: usize) -> Option<&ResultGroup> {
        self.slot(index).and_then(|slot| slot.graded.as_ref())
    }

    /// Whether a question has been graded at least once in this run.
    pub fn is_graded(&self, index: usize) -> bool {
        self.graded_results(index).is_some()
    }

    /// Move to another question and restore its buffer and caches.
    ///
    /// Returns `false` (and changes nothing) for an out-of-range index.
    pub fn set_index(&mut self, index: usize) -> bool {
        if index >= self.questions.len() {
            tracing::warn!(index, len = self.questions.len(), "Ignoring out-of-range index");
            return false;
        }
        self.current = index;
        self.restore_view();
        true
    }

    /// Overwrite the code buffer of one question. Result caches stay as they
    /// are, so the last results keep showing until the next grade lands.
    pub fn edit_code(&mut self, index: usize, code: impl Into<String>) -> bool {
        let Some(key) = self.keys.get(index).cloned() else {
            return false;
        };
        let code = code.into();
        if self.is_current(&key) {
            self.view.code = code.clone();
        }
        self.slots.entry(key).or_default().code = Some(code);
        true
    }

    /// Store both result groups for one question, mirroring them into the
    /// view when it is the displayed one.
    pub fn record_results(&mut self, index: usize, classified: Classified) -> bool {
        let Some(key) = self.keys.get(index).cloned() else {
            return false;
        };
        self.write_results(key, classified);
        true
    }

    /// Replace the question at `index` in place (used after a lazy fetch).
    ///
    /// Cached state stays attached to the position's key.
    pub fn replace_question(&mut self, index: usize, question: Question) -> bool {
        match self.questions.get_mut(index) {
            Some(slot) => {
                *slot = question;
                if index == self.current {
                    self.view.question_id = self.questions[index].id.clone();
                }
                true
            }
            None => false,
        }
    }

    /// Start a submission for one question and hand out its fencing ticket.
    pub fn issue_ticket(&mut self, index: usize) -> Option<SubmissionTicket> {
        let key = self.keys.get(index).cloned()?;
        self.next_token += 1;
        let token = self.next_token;

        let slot = self.slots.entry(key.clone()).or_default();
        slot.latest_token = Some(token);
        slot.awaiting = true;
        if self.is_current(&key) {
            self.view.loading = true;
        }

        tracing::debug!(index, token, "Submission ticket issued");
        Some(SubmissionTicket {
            key,
            index,
            token,
            generation: self.generation,
        })
    }

    /// Apply a grading response to the question it was issued for.
    ///
    /// Only the latest ticket of a question may write its caches; older
    /// responses are dropped even if they arrive last.
    pub fn complete_submission(
        &mut self,
        ticket: &SubmissionTicket,
        classified: Classified,
    ) -> ApplyResult {
        match self.check_ticket(ticket) {
            ApplyResult::Applied => {}
            other => {
                tracing::info!(index = ticket.index, token = ticket.token, outcome = ?other, "Dropping grading response");
                return other;
            }
        }

        if let Some(slot) = self.slots.get_mut(&ticket.key) {
            slot.awaiting = false;
        }
        if self.is_current(&ticket.key) {
            self.view.loading = false;
        }
        self.write_results(ticket.key.clone(), classified);
        ApplyResult::Applied
    }

    /// Settle a failed submission: the displayed results are cleared when the
    /// question is on screen, cached results are left alone.
    pub fn fail_submission(&mut self, ticket: &SubmissionTicket) -> ApplyResult {
        let outcome = self.check_ticket(ticket);
        if outcome != ApplyResult::Applied {
            return outcome;
        }

        if let Some(slot) = self.slots.get_mut(&ticket.key) {
            slot.awaiting = false;
        }
        if self.is_current(&ticket.key) {
            self.view.loading = false;
            self.view.raw = Vec::new();
            self.view.custom = ResultGroup::default();
            self.view.graded = ResultGroup::default();
        }
        ApplyResult::Applied
    }

    fn check_ticket(&self, ticket: &SubmissionTicket) -> ApplyResult {
        if ticket.generation != self.generation {
            return ApplyResult::Discarded;
        }
        match self.slots.get(&ticket.key) {
            Some(slot) if slot.latest_token == Some(ticket.token) => ApplyResult::Applied,
            Some(_) => ApplyResult::Superseded,
            None => ApplyResult::Discarded,
        }
    }

    fn is_current(&self, key: &SlotKey) -> bool {
        self.keys.get(self.current) == Some(key)
    }

    fn write_results(&mut self, key: SlotKey, classified: Classified) {
        if self.is_current(&key) {
            self.view.raw = classified.raw.clone();
            self.view.custom = classified.custom.clone();
            self.view.graded = classified.graded.clone();
        }
        let slot = self.slots.entry(key).or_default();
        slot.raw = Some(classified.raw);
        slot.custom = Some(classified.custom);
        slot.graded = Some(classified.graded);
    }

    fn restore_view(&mut self) {
        let slot = self.slot(self.current).cloned().unwrap_or_default();
        self.view = ActiveView {
            index: self.current,
            question_id: self.current_question().and_then(|q| q.id.clone()),
            code: self.code_for(self.current),
            raw: slot.raw.unwrap_or_default(),
            custom: slot.custom.unwrap_or_default(),
            graded: slot.graded.unwrap_or_default(),
            loading: slot.awaiting,
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::classify;
    use practice_common::types::{CaseKind, GradingResult, Summary};

    fn q(id: &str) -> Question {
        Question {
            id: Some(id.to_string()),
            prompt: Some(format!("prompt {}", id)),
            ..Default::default()
        }
    }

    fn graded(passed: bool) -> Classified {
        let raw = vec![GradingResult {
            input: None,
            expected_output: "1".to_string(),
            actual_output: if passed { "1" } else { "0" }.to_string(),
            kind: Some(CaseKind::Sample),
        }];
        classify(&raw, false)
    }

    fn session() -> PracticeSession {
        PracticeSession::new(vec![q("a"), q("b"), q("c")], 0, HashMap::new())
    }

    #[test]
    fn test_code_fallback_order() {
        let mut code_map = HashMap::new();
        code_map.insert(1, "seeded".to_string());
        let mut s = PracticeSession::new(vec![q("a"), q("b")], 0, code_map)
            .with_initial_source(Some("starter".to_string()));

        assert_eq!(s.view().code, "starter");
        assert!(s.set_index(1));
        assert_eq!(s.view().code, "seeded");

        let s = PracticeSession::new(vec![q("a")], 0, HashMap::new());
        assert_eq!(s.view().code, "");
    }

    #[test]
    fn test_edit_only_touches_one_buffer() {
        let mut s = session();
        s.edit_code(0, "code a");
        s.edit_code(2, "code c");

        assert_eq!(s.view().code, "code a");
        assert_eq!(s.code_for(1), "");
        assert_eq!(s.code_for(2), "code c");
    }

    #[test]
    fn test_edit_keeps_stale_results() {
        let mut s = session();
        s.record_results(0, graded(true));
        s.edit_code(0, "changed");
        assert_eq!(s.view().graded.summary, Summary { passed: 1, failed: 0 });
    }

    #[test]
    fn test_excursion_restores_state() {
        let mut s = session();
        s.edit_code(0, "first");
        s.record_results(0, graded(false));
        let before = s.view().clone();
        assert_eq!(before.raw.len(), 1);
        assert_eq!(before.raw[0].actual_output, "0");

        s.set_index(2);
        s.edit_code(2, "third");
        s.record_results(2, graded(true));
        assert_eq!(s.view().code, "third");

        s.set_index(0);
        assert_eq!(s.view(), &before);
        assert_eq!(s.view().raw, before.raw);
        assert_eq!(s.code_for(2), "third");
        assert!(s.is_graded(2));
        assert!(!s.is_graded(1));
    }

    #[test]
    fn test_record_results_for_background_question() {
        let mut s = session();
        s.record_results(1, graded(true));

        // current view untouched
        assert_eq!(s.view().graded, ResultGroup::default());
        s.set_index(1);
        assert_eq!(s.view().graded.summary.passed, 1);
    }

    #[test]
    fn test_out_of_range_is_ignored() {
        let mut s = session();
        assert!(!s.set_index(3));
        assert!(!s.edit_code(7, "x"));
        assert!(!s.record_results(9, graded(true)));
        assert!(s.issue_ticket(3).is_none());
        assert_eq!(s.current_index(), 0);
    }

    #[test]
    fn test_stale_response_lands_on_original_question() {
        let mut s = session();
        let ticket = s.issue_ticket(0).unwrap();
        assert!(s.view().loading);

        s.set_index(1);
        assert!(!s.view().loading);

        assert_eq!(s.complete_submission(&ticket, graded(true)), ApplyResult::Applied);
        assert_eq!(s.view().graded, ResultGroup::default());
        assert_eq!(s.graded_results(0).unwrap().summary.passed, 1);
        assert!(s.graded_results(1).is_none());
    }

    #[test]
    fn test_superseded_response_is_dropped() {
        let mut s = session();
        let first = s.issue_ticket(0).unwrap();
        let second = s.issue_ticket(0).unwrap();
        assert!(second.token > first.token);

        assert_eq!(s.complete_submission(&second, graded(true)), ApplyResult::Applied);
        assert_eq!(s.complete_submission(&first, graded(false)), ApplyResult::Superseded);
        assert_eq!(s.view().graded.summary, Summary { passed: 1, failed: 0 });
        assert!(!s.view().loading);
    }

    #[test]
    fn test_failure_clears_view_but_keeps_cache() {
        let mut s = session();
        s.record_results(0, graded(true));
        let ticket = s.issue_ticket(0).unwrap();

        assert_eq!(s.fail_submission(&ticket), ApplyResult::Applied);
        assert_eq!(s.view().graded, ResultGroup::default());
        assert!(s.view().raw.is_empty());
        assert!(!s.view().loading);
        assert_eq!(s.graded_results(0).unwrap().summary.passed, 1);
        assert_eq!(s.raw_results(0).unwrap().len(), 1);

        // coming back restores the cached results
        s.set_index(1);
        s.set_index(0);
        assert_eq!(s.view().graded.summary.passed, 1);
        assert_eq!(s.view().raw.len(), 1);
    }

    #[test]
    fn test_superseded_failure_is_ignored() {
        let mut s = session();
        let first = s.issue_ticket(0).unwrap();
        let _second = s.issue_ticket(0).unwrap();

        assert_eq!(s.fail_submission(&first), ApplyResult::Superseded);
        assert!(s.view().loading);
    }

    #[test]
    fn test_replacement_discards_caches_and_pending() {
        let mut s = session();
        s.edit_code(0, "old");
        s.record_results(0, graded(true));
        let ticket = s.issue_ticket(0).unwrap();

        s.replace_question_list(vec![q("a"), q("z")], 1, HashMap::new());
        assert_eq!(s.current_index(), 1);
        assert_eq!(s.code_for(0), "");
        assert!(s.graded_results(0).is_none());
        assert_eq!(s.complete_submission(&ticket, graded(true)), ApplyResult::Discarded);
        assert!(s.graded_results(0).is_none());
    }

    #[test]
    fn test_response_follows_question_identity() {
        let mut s = session();
        s.set_index(2);
        let ticket = s.issue_ticket(2).unwrap();
        s.set_index(0);
        s.complete_submission(&ticket, graded(true));

        // the cache belongs to question "c" whatever position is displayed
        assert_eq!(s.question(2).unwrap().id.as_deref(), Some("c"));
        assert!(s.is_graded(2));
        assert!(!s.is_graded(0));
    }

    #[test]
    fn test_anonymous_questions_do_not_share_state() {
        let mut s = PracticeSession::new(
            vec![Question::default(), Question::default()],
            0,
            HashMap::new(),
        );
        s.edit_code(0, "zero");
        assert_eq!(s.code_for(1), "");
    }

    #[test]
    fn test_replace_question_keeps_state() {
        let mut s = session();
        s.edit_code(0, "mine");
        let mut full = q("a");
        full.constraints = "n <= 10".to_string();
        assert!(s.replace_question(0, full));
        assert_eq!(s.current_question().unwrap().constraints, "n <= 10");
        assert_eq!(s.view().code, "mine");
    }

    #[test]
    fn test_empty_session() {
        let mut s = PracticeSession::new(vec![], 4, HashMap::new());
        assert!(s.is_empty());
        assert_eq!(s.current_index(), 0);
        assert_eq!(s.view().question_id, None);
        assert!(!s.set_index(0));
    }
}
