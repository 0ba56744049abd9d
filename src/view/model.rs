//! The claim-aware view model.

use crate::api::{ApiError, ApiReply, ClaimApi};
use crate::gate::{Action, ActionGate, GateDenial, Permissions};
use crate::operator::OperatorContext;
use crate::resource::{ClaimableResource, ResourceKey, ResourceStatus, ResourceType};
use crate::view::predicates::is_claimed_by_me;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::fmt;

/// Something the operator should be told.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// Non-alarming outcome, including a lost claim race.
    Info(String),
    /// A refused or failed action.
    Error(String),
    /// A claim this operator held was taken away between polls.
    Revoked {
        resource: ResourceKey,
        /// Who holds it now, if anyone.
        holder: Option<String>,
    },
}

impl Notice {
    /// Revocations interrupt the operator; everything else can be a toast.
    pub fn is_high_salience(&self) -> bool {
        matches!(self, Notice::Revoked { .. })
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::Info(message) | Notice::Error(message) => f.write_str(message),
            Notice::Revoked {
                resource,
                holder: Some(holder),
            } => write!(
                f,
                "Your claim on {} was revoked; it is now held by {}. Unsaved changes were discarded.",
                resource, holder
            ),
            Notice::Revoked {
                resource,
                holder: None,
            } => write!(
                f,
                "Your claim on {} was revoked. Unsaved changes were discarded.",
                resource
            ),
        }
    }
}

/// An open mutate form. Once invalidated it can no longer be submitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditForm {
    pub invalidated: bool,
}

/// The resource the operator currently has open.
#[derive(Debug, Clone, PartialEq)]
pub struct DetailView {
    pub resource: ClaimableResource,
    pub form: Option<EditForm>,
}

/// What one reconciliation changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Resources whose claim this operator lost.
    pub revoked: Vec<ResourceKey>,
    /// Whether the open detail view was replaced or closed.
    pub detail_refreshed: bool,
    /// Whether an open mutate form was invalidated.
    pub form_invalidated: bool,
}

impl ReconcileReport {
    pub fn has_revocations(&self) -> bool {
        !self.revoked.is_empty()
    }
}

/// One operator's cached view of a resource queue.
///
/// State changes only through [`ClaimView::reconcile`]. The verbs call the
/// API and report the outcome as a notice; they never patch the cache, so a
/// lost race or a failed call leaves local belief exactly as the last poll
/// left it.
#[derive(Debug)]
pub struct ClaimView {
    operator: OperatorContext,
    resource_type: ResourceType,
    cache: BTreeMap<String, ClaimableResource>,
    detail: Option<DetailView>,
    notices: VecDeque<Notice>,
    /// Claims this operator gave up itself, not yet reflected by a poll.
    relinquished: BTreeSet<String>,
}

impl ClaimView {
    pub fn new(operator: OperatorContext, resource_type: ResourceType) -> Self {
        Self {
            operator,
            resource_type,
            cache: BTreeMap::new(),
            detail: None,
            notices: VecDeque::new(),
            relinquished: BTreeSet::new(),
        }
    }

    pub fn operator(&self) -> &OperatorContext {
        &self.operator
    }

    pub fn resource_type(&self) -> ResourceType {
        self.resource_type
    }

    /// Cached resources in ID order.
    pub fn resources(&self) -> impl Iterator<Item = &ClaimableResource> {
        self.cache.values()
    }

    pub fn get(&self, resource_id: &str) -> Option<&ClaimableResource> {
        self.cache.get(resource_id)
    }

    pub fn detail(&self) -> Option<&DetailView> {
        self.detail.as_ref()
    }

    pub fn permissions(&self, resource_id: &str) -> Option<Permissions> {
        self.get(resource_id)
            .map(|r| ActionGate::permissions(r, &self.operator))
    }

    pub fn pending_notices(&self) -> usize {
        self.notices.len()
    }

    /// Remove and return queued notices, oldest first.
    pub fn take_notices(&mut self) -> Vec<Notice> {
        self.notices.drain(..).collect()
    }

    /// Merge a fresh snapshot into the cache.
    ///
    /// Every resource believed claimed by this operator is compared with the
    /// snapshot. If the snapshot shows another holder, no holder, or no
    /// resource at all, the claim was revoked: one [`Notice::Revoked`] is
    /// queued, an open form on it is invalidated, and its detail view is
    /// refreshed. The snapshot then replaces the cache, so the same
    /// revocation is never reported twice.
    ///
    /// Claims the operator released or closed through this view since the
    /// last poll are not revocations. That exemption lasts one poll.
    pub fn reconcile(&mut self, snapshot: Vec<ClaimableResource>) -> ReconcileReport {
        let fresh: BTreeMap<String, ClaimableResource> = snapshot
            .into_iter()
            .filter(|r| r.resource_type == self.resource_type)
            .map(|r| (r.resource_id.clone(), r))
            .collect();

        let mut report = ReconcileReport::default();

        for (id, cached) in &self.cache {
            if !is_claimed_by_me(cached, &self.operator) {
                continue;
            }
            let current = fresh.get(id);
            if current.is_some_and(|r| is_claimed_by_me(r, &self.operator)) {
                continue;
            }
            if self.relinquished.contains(id) {
                continue;
            }

            let holder = current.and_then(|r| r.claimed_by_username.clone());
            tracing::warn!(
                resource = %cached.key(),
                operator = %self.operator.username,
                holder = holder.as_deref().unwrap_or("-"),
                "claim revoked"
            );
            self.notices.push_back(Notice::Revoked {
                resource: cached.key(),
                holder,
            });
            report.revoked.push(cached.key());
        }

        let mut detail_gone = false;
        if let Some(detail) = self.detail.as_mut() {
            let id = &detail.resource.resource_id;
            if report.revoked.iter().any(|k| &k.resource_id == id)
                && let Some(form) = detail.form.as_mut()
                && !form.invalidated
            {
                form.invalidated = true;
                report.form_invalidated = true;
            }

            match fresh.get(id) {
                Some(current) if &detail.resource != current => {
                    detail.resource = current.clone();
                    report.detail_refreshed = true;
                }
                Some(_) => {}
                None => detail_gone = true,
            }
        }
        if detail_gone {
            self.detail = None;
            report.detail_refreshed = true;
        }

        // A claim still held after this poll is a new one.
        self.relinquished.clear();
        self.cache = fresh;
        report
    }

    /// Fetch a snapshot through `api` and reconcile it.
    pub fn refresh(&mut self, api: &dyn ClaimApi) -> Result<ReconcileReport, ApiError> {
        let snapshot = api.list(self.resource_type)?;
        Ok(self.reconcile(snapshot))
    }

    /// Open a resource's detail view, if the operator may see it.
    pub fn open_detail(&mut self, resource_id: &str) -> Result<(), GateDenial> {
        let resource = self.gated(resource_id, Action::View)?;
        self.detail = Some(DetailView {
            resource,
            form: None,
        });
        Ok(())
    }

    /// Close the detail view and any form on it.
    pub fn close_detail(&mut self) {
        self.detail = None;
    }

    /// Open a mutate form on a resource this operator has claimed.
    pub fn begin_edit(&mut self, resource_id: &str) -> Result<(), GateDenial> {
        let resource = self.gated(resource_id, Action::Mutate)?;
        self.detail = Some(DetailView {
            resource,
            form: Some(EditForm { invalidated: false }),
        });
        Ok(())
    }

    /// Submit the open form as a status change.
    ///
    /// Refused locally when no form is open, when a revocation invalidated
    /// it, or when the cached resource no longer permits mutation.
    pub fn submit_edit(&mut self, api: &dyn ClaimApi, status: ResourceStatus) -> bool {
        let Some(detail) = &self.detail else {
            self.notices
                .push_back(Notice::Error("no edit in progress".to_string()));
            return false;
        };
        match &detail.form {
            None => {
                self.notices
                    .push_back(Notice::Error("no edit in progress".to_string()));
                return false;
            }
            Some(form) if form.invalidated => {
                self.notices.push_back(Notice::Error(format!(
                    "edit discarded: your claim on {} was revoked",
                    detail.resource.key()
                )));
                return false;
            }
            Some(_) => {}
        }

        let resource_id = detail.resource.resource_id.clone();
        let Ok(resource) = self.gated(&resource_id, Action::Mutate) else {
            return false;
        };

        let outcome = api.apply_status(&resource.key(), status);
        let ok = self.report(outcome);
        if ok {
            self.detail = None;
            if status.is_terminal() {
                self.relinquished.insert(resource_id);
            }
        }
        ok
    }

    /// Claim a resource. Returns whether the claim was taken.
    pub fn claim_request(&mut self, api: &dyn ClaimApi, resource_id: &str) -> bool {
        match self.gated(resource_id, Action::Claim) {
            Ok(resource) => {
                let outcome = api.claim(&resource.key());
                let ok = self.report(outcome);
                if ok {
                    self.relinquished.remove(&resource.resource_id);
                }
                ok
            }
            Err(_) => false,
        }
    }

    /// Release this operator's claim. Returns whether it was released.
    pub fn release_request(&mut self, api: &dyn ClaimApi, resource_id: &str) -> bool {
        match self.gated(resource_id, Action::Release) {
            Ok(resource) => {
                let outcome = api.release(&resource.key());
                let ok = self.report(outcome);
                if ok {
                    self.relinquished.insert(resource.resource_id);
                }
                ok
            }
            Err(_) => false,
        }
    }

    /// Force-release any claim. Privileged operators only.
    pub fn force_release_request(&mut self, api: &dyn ClaimApi, resource_id: &str) -> bool {
        match self.gated(resource_id, Action::ForceRelease) {
            Ok(resource) => {
                let outcome = api.force_release(&resource.key());
                let ok = self.report(outcome);
                if ok && is_claimed_by_me(&resource, &self.operator) {
                    self.relinquished.insert(resource.resource_id);
                }
                ok
            }
            Err(_) => false,
        }
    }

    /// Look up a cached resource and check the gate, queueing an error
    /// notice on refusal.
    fn gated(&mut self, resource_id: &str, action: Action) -> Result<ClaimableResource, GateDenial> {
        let Some(resource) = self.cache.get(resource_id) else {
            self.notices.push_back(Notice::Error(format!(
                "{}/{} is not in the current listing",
                self.resource_type, resource_id
            )));
            return Err(GateDenial::Unlisted);
        };

        match ActionGate::check(resource, &self.operator, action) {
            Ok(()) => Ok(resource.clone()),
            Err(denial) => {
                self.notices.push_back(Notice::Error(format!(
                    "cannot {} {}: {}",
                    action,
                    resource.key(),
                    denial
                )));
                Err(denial)
            }
        }
    }

    fn report(&mut self, outcome: Result<ApiReply, ApiError>) -> bool {
        match outcome {
            Ok(reply) => {
                self.notices.push_back(Notice::Info(reply.message));
                true
            }
            Err(ApiError::Conflict { detail }) => {
                self.notices.push_back(Notice::Info(detail));
                false
            }
            Err(err) => {
                tracing::debug!(status = err.status_code(), "request failed: {}", err);
                self.notices.push_back(Notice::Error(err.to_string()));
                false
            }
        }
    }
}
