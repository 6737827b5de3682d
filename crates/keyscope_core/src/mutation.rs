use std::sync::Arc;

use serde_json::json;

use crate::context::BrowserContext;
use crate::error::ValidationError;
use crate::member::CollectionMember;
use crate::source::{DeleteMembersRequest, UpdateMembersRequest};
use crate::table::delete_popover_id;
use crate::telemetry::{TelemetryEvent, TelemetrySink, emit_for};

/// Texts of the delete confirmation popover.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletePrompt {
    pub popover_id: String,
    pub header: String,
    pub message: String,
    /// Extra warning when removing the member would remove the whole key.
    pub info: Option<String>,
}

pub fn remove_last_element_info(noun: &str) -> String {
    format!(
        "If you remove the single {}, the whole Key will be deleted.",
        noun
    )
}

/// Row edit and delete flow of one member table.
///
/// Holds the row view state that mutations touch: which row is editable and
/// which delete popover is open. Members only change after the server
/// confirms, through the paged list state.
pub struct MutationCoordinator {
    context: BrowserContext,
    telemetry: Arc<dyn TelemetrySink>,
    editing: Option<String>,
    deleting: Option<String>,
}

impl MutationCoordinator {
    pub fn new(context: BrowserContext, telemetry: Arc<dyn TelemetrySink>) -> Self {
        Self {
            context,
            telemetry,
            editing: None,
            deleting: None,
        }
    }

    pub fn editing(&self) -> Option<&str> {
        self.editing.as_deref()
    }

    pub fn is_editing(&self, member_key: &str) -> bool {
        self.editing.as_deref() == Some(member_key)
    }

    pub fn deleting(&self) -> Option<&str> {
        self.deleting.as_deref()
    }

    // --- Edit ---

    /// Makes `member_key` the only editable row.
    ///
    /// Returns the row indices whose measured height is now stale: the row
    /// that stopped editing, if any, and the one that started.
    pub fn begin_edit<M: CollectionMember>(&mut self, member_key: &str, members: &[M]) -> Vec<usize> {
        let previous = self.editing.replace(member_key.to_string());

        let mut stale = Vec::with_capacity(2);
        if let Some(previous) = previous.as_deref()
            && previous != member_key
            && let Some(index) = position(members, previous)
        {
            stale.push(index);
        }
        if let Some(index) = position(members, member_key) {
            stale.push(index);
        }
        stale
    }

    /// Leaves edit mode for `member_key`; other rows are unaffected.
    pub fn cancel_edit<M: CollectionMember>(&mut self, member_key: &str, members: &[M]) -> Vec<usize> {
        if !self.is_editing(member_key) {
            return Vec::new();
        }

        self.editing = None;
        position(members, member_key).into_iter().collect()
    }

    /// Validates `raw` and builds the update for the editing row.
    ///
    /// On a validation error nothing is dispatched and the row stays editable.
    pub fn apply_edit<M: CollectionMember>(
        &self,
        member: &M,
        raw: &str,
    ) -> Result<UpdateMembersRequest<M>, ValidationError> {
        if !self.is_editing(member.member_key()) {
            return Err(ValidationError::Invalid(format!(
                "{} is not being edited",
                member.member_key()
            )));
        }

        let edited = member.with_edited_value(raw)?;

        Ok(UpdateMembersRequest {
            key_name: self.context.key_name.clone(),
            members: vec![edited],
        })
    }

    /// Server accepted the update of `member_key`.
    pub fn on_edit_success(&mut self, member_key: &str) -> bool {
        if self.is_editing(member_key) {
            self.editing = None;
            true
        } else {
            false
        }
    }

    // --- Delete ---

    pub fn show_delete(&mut self, member_key: &str) {
        emit_for(
            self.telemetry.as_ref(),
            &self.context,
            TelemetryEvent::KeyValueRemoveClicked,
            json!({}),
        );
        self.deleting = Some(delete_popover_id(self.context.key_type, member_key));
    }

    pub fn close_delete(&mut self) {
        self.deleting = None;
    }

    pub fn is_delete_open(&self, member_key: &str) -> bool {
        self.deleting.as_deref()
            == Some(delete_popover_id(self.context.key_type, member_key).as_str())
    }

    pub fn delete_prompt(&self, member_key: &str, key_length: u64) -> DeletePrompt {
        let info = (key_length == 1)
            .then(|| remove_last_element_info(self.context.key_type.element_noun()));

        DeletePrompt {
            popover_id: delete_popover_id(self.context.key_type, member_key),
            header: format!("{} will be removed.", member_key),
            message: format!(
                "{} will be removed from {}.",
                self.context.key_type.element_noun(),
                self.context.key_name
            ),
            info,
        }
    }

    /// Confirms the popover: closes it and builds the removal of exactly one member.
    pub fn confirm_delete(&mut self, member_key: &str) -> DeleteMembersRequest {
        self.close_delete();

        DeleteMembersRequest {
            key_name: self.context.key_name.clone(),
            member_keys: vec![member_key.to_string()],
        }
    }

    pub fn on_delete_success(&mut self, removed: u64) {
        self.close_delete();
        emit_for(
            self.telemetry.as_ref(),
            &self.context,
            TelemetryEvent::KeyValueRemoved,
            json!({ "numberOfRemoved": removed }),
        );
    }
}

fn position<M: CollectionMember>(members: &[M], member_key: &str) -> Option<usize> {
    members.iter().position(|m| m.member_key() == member_key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::member::{KeyType, ZSetMember};
    use crate::telemetry::NoopTelemetry;

    fn coordinator() -> MutationCoordinator {
        MutationCoordinator::new(
            BrowserContext::new("db-1", "scores", KeyType::SortedSet, 2),
            Arc::new(NoopTelemetry),
        )
    }

    fn members() -> Vec<ZSetMember> {
        vec![ZSetMember::new("a", 1.0), ZSetMember::new("b", 2.0)]
    }

    #[test]
    fn editing_second_row_closes_the_first() {
        let mut coordinator = coordinator();
        let members = members();

        assert_eq!(coordinator.begin_edit("a", &members), vec![0]);
        assert_eq!(coordinator.begin_edit("b", &members), vec![0, 1]);

        assert!(!coordinator.is_editing("a"));
        assert!(coordinator.is_editing("b"));
    }

    #[test]
    fn apply_edit_builds_a_single_member_update() {
        let mut coordinator = coordinator();
        let members = members();
        coordinator.begin_edit("a", &members);

        let request = coordinator.apply_edit(&members[0], "5").expect("valid");
        assert_eq!(
            request,
            UpdateMembersRequest {
                key_name: "scores".to_string(),
                members: vec![ZSetMember::new("a", 5.0)],
            }
        );

        assert!(coordinator.is_editing("a"));
        assert!(coordinator.on_edit_success("a"));
        assert_eq!(coordinator.editing(), None);
    }

    #[test]
    fn invalid_score_keeps_the_row_editable() {
        let mut coordinator = coordinator();
        let members = members();
        coordinator.begin_edit("a", &members);

        assert_eq!(
            coordinator.apply_edit(&members[0], "abc"),
            Err(ValidationError::NotANumber { field: "score" })
        );
        assert!(coordinator.is_editing("a"));
    }

    #[test]
    fn cancel_only_touches_the_named_row() {
        let mut coordinator = coordinator();
        let members = members();
        coordinator.begin_edit("b", &members);

        assert!(coordinator.cancel_edit("a", &members).is_empty());
        assert!(coordinator.is_editing("b"));
        assert_eq!(coordinator.cancel_edit("b", &members), vec![1]);
    }

    #[test]
    fn delete_prompt_warns_about_the_last_member() {
        let coordinator = coordinator();

        let prompt = coordinator.delete_prompt("a", 1);
        assert_eq!(prompt.popover_id, "a_zset");
        assert_eq!(
            prompt.info.as_deref(),
            Some("If you remove the single Member, the whole Key will be deleted.")
        );
        assert_eq!(coordinator.delete_prompt("a", 2).info, None);
    }

    #[test]
    fn confirm_closes_the_popover() {
        let mut coordinator = coordinator();
        coordinator.show_delete("a");
        assert!(coordinator.is_delete_open("a"));

        let request = coordinator.confirm_delete("a");
        assert_eq!(request.member_keys, vec!["a".to_string()]);
        assert_eq!(coordinator.deleting(), None);
    }
}
