//! Application lifecycle triggers.
//!
//! Turns running-application snapshots and frontmost changes into context
//! transitions and looks up the workflows listening for each.

use std::collections::BTreeSet;

use tracing::{debug, trace};
use workflow_config::AppContext;

use crate::cache::{TriggerTables, WorkflowRef};

/// One workflow to fire for an application transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppFire {
    /// Application the transition happened to.
    pub bundle_identifier: String,
    /// Which transition.
    pub context: AppContext,
    /// Workflow listening for it.
    pub workflow: WorkflowRef,
}

/// Remembers the last running set and frontmost application.
#[derive(Debug, Default)]
pub struct ApplicationTriggerTracker {
    running: Option<BTreeSet<String>>,
    frontmost: Option<String>,
}

fn fires_for(
    tables: &TriggerTables,
    bundle: &str,
    context: AppContext,
    out: &mut Vec<AppFire>,
) {
    for wf in tables.app_workflows(bundle, context) {
        out.push(AppFire {
            bundle_identifier: bundle.to_string(),
            context,
            workflow: wf.clone(),
        });
    }
}

impl ApplicationTriggerTracker {
    /// Tracker with no history.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current frontmost application, if known.
    pub fn frontmost(&self) -> Option<&str> {
        self.frontmost.as_deref()
    }

    /// Last observed running set (`None` before the first snapshot).
    pub fn running(&self) -> Option<&BTreeSet<String>> {
        self.running.as_ref()
    }

    /// Diff a running-applications snapshot against the previous one.
    ///
    /// The first snapshot only seeds state. Closures are reported before
    /// launches, each in bundle-id order.
    pub fn on_running_applications<I, S>(&mut self, tables: &TriggerTables, apps: I) -> Vec<AppFire>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let now: BTreeSet<String> = apps
            .into_iter()
            .map(Into::into)
            .filter(|b: &String| !b.is_empty())
            .collect();
        let Some(prev) = self.running.replace(now.clone()) else {
            debug!(count = now.len(), "running_apps_seeded");
            return Vec::new();
        };

        let mut fires = Vec::new();
        for closed in prev.difference(&now) {
            trace!(bundle = %closed, "app_closed");
            fires_for(tables, closed, AppContext::Closed, &mut fires);
        }
        for launched in now.difference(&prev) {
            trace!(bundle = %launched, "app_launched");
            fires_for(tables, launched, AppContext::Launched, &mut fires);
        }
        fires
    }

    /// Record a new frontmost application. Returns `None` when it did not
    /// change, otherwise the resign/front fires (possibly empty).
    pub fn on_frontmost_changed(
        &mut self,
        tables: &TriggerTables,
        bundle_identifier: &str,
    ) -> Option<Vec<AppFire>> {
        if self.frontmost.as_deref() == Some(bundle_identifier) {
            return None;
        }
        let previous = self.frontmost.replace(bundle_identifier.to_string());
        trace!(from = ?previous, to = %bundle_identifier, "frontmost_changed");

        let mut fires = Vec::new();
        if let Some(prev) = previous.as_deref() {
            fires_for(tables, prev, AppContext::ResignFrontMost, &mut fires);
        }
        fires_for(tables, bundle_identifier, AppContext::FrontMost, &mut fires);
        Some(fires)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{app_trigger, config, group, scoped_group};

    fn tables() -> TriggerTables {
        TriggerTables::build(
            1,
            1,
            &config(vec![group(
                "apps",
                vec![
                    app_trigger("safari-up", "com.apple.Safari", &[AppContext::Launched]),
                    app_trigger("safari-down", "com.apple.Safari", &[AppContext::Closed]),
                    app_trigger("mail-up", "com.apple.mail", &[AppContext::Launched]),
                    app_trigger(
                        "term-focus",
                        "com.apple.Terminal",
                        &[AppContext::FrontMost, AppContext::ResignFrontMost],
                    ),
                ],
            )]),
        )
    }

    fn summary(fires: &[AppFire]) -> Vec<(String, AppContext, String)> {
        fires
            .iter()
            .map(|f| (f.bundle_identifier.clone(), f.context, f.workflow.id.clone()))
            .collect()
    }

    #[test]
    fn first_snapshot_seeds_silently() {
        let t = tables();
        let mut tr = ApplicationTriggerTracker::new();
        assert!(tr.on_running_applications(&t, ["com.apple.Safari"]).is_empty());
        assert_eq!(tr.running().map(BTreeSet::len), Some(1));
        assert!(tr.on_running_applications(&t, ["com.apple.Safari"]).is_empty());
    }

    #[test]
    fn diff_reports_closed_then_launched() {
        let t = tables();
        let mut tr = ApplicationTriggerTracker::new();
        tr.on_running_applications(&t, ["com.apple.Safari", "com.apple.Finder"]);
        let fires = tr.on_running_applications(&t, ["com.apple.mail", "com.apple.Finder"]);
        assert_eq!(
            summary(&fires),
            vec![
                ("com.apple.Safari".into(), AppContext::Closed, "safari-down".into()),
                ("com.apple.mail".into(), AppContext::Launched, "mail-up".into()),
            ]
        );
    }

    #[test]
    fn frontmost_transitions() {
        let t = tables();
        let mut tr = ApplicationTriggerTracker::new();
        let fires = tr.on_frontmost_changed(&t, "com.apple.Terminal").unwrap();
        assert_eq!(
            summary(&fires),
            vec![("com.apple.Terminal".into(), AppContext::FrontMost, "term-focus".into())]
        );
        assert!(tr.on_frontmost_changed(&t, "com.apple.Terminal").is_none());

        let fires = tr.on_frontmost_changed(&t, "com.apple.Safari").unwrap();
        assert_eq!(
            summary(&fires),
            vec![(
                "com.apple.Terminal".into(),
                AppContext::ResignFrontMost,
                "term-focus".into()
            )]
        );
        assert_eq!(tr.frontmost(), Some("com.apple.Safari"));
    }

    #[test]
    fn app_triggers_ignore_group_scope() {
        let t = TriggerTables::build(
            1,
            1,
            &config(vec![scoped_group(
                "scoped",
                &["com.other"],
                &["nav"],
                vec![app_trigger("x", "com.apple.Safari", &[AppContext::FrontMost])],
            )]),
        );
        let mut tr = ApplicationTriggerTracker::new();
        let fires = tr.on_frontmost_changed(&t, "com.apple.Safari").unwrap();
        assert_eq!(fires.len(), 1);
    }
}
