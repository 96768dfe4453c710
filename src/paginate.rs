use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use indicatif::ProgressBar;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::parser::extract;
use crate::record::PublicationRecord;
use crate::surface::{ListSurface, MoreControl};

pub const DEFAULT_MAX_ITERATIONS: usize = 200;
pub const DEFAULT_SETTLE_MS: u64 = 800;

#[derive(Debug, Clone)]
pub struct PaginationConfig {
    pub max_iterations: usize,
    pub settle: Duration,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
            settle: Duration::from_millis(DEFAULT_SETTLE_MS),
        }
    }
}

/// Cooperative cancellation, checked between iterations.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Control missing or disabled: the list is complete.
    Exhausted,
    /// Iteration cap reached; whatever loaded is extracted.
    Capped,
    Cancelled,
}

pub struct Expanded {
    pub records: Vec<PublicationRecord>,
    pub activations: usize,
    pub stop: StopReason,
}

pub struct Paginator {
    config: PaginationConfig,
    cancel: CancelFlag,
    progress: ProgressBar,
}

impl Paginator {
    pub fn new(config: PaginationConfig) -> Self {
        Self {
            config,
            cancel: CancelFlag::default(),
            progress: ProgressBar::hidden(),
        }
    }

    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = progress;
        self
    }

    /// Expand the list until the surface reports exhaustion, then extract once.
    /// Surface faults propagate unchanged; nothing is retried.
    pub async fn expand_and_extract<S: ListSurface>(&self, surface: &mut S) -> Result<Expanded> {
        let mut activations = 0;
        let mut stop = StopReason::Capped;

        for _ in 0..self.config.max_iterations {
            if self.cancel.is_cancelled() {
                stop = StopReason::Cancelled;
                break;
            }
            match surface.more_control() {
                MoreControl::Absent | MoreControl::Disabled => {
                    stop = StopReason::Exhausted;
                    break;
                }
                MoreControl::Enabled => {}
            }

            surface.activate_more().await?;
            surface.scroll_to_end().await?;
            activations += 1;
            self.progress
                .set_message(format!("show more x{} ({} rows)", activations, surface.entries().len()));
            debug!(activations, "Show more activated");

            tokio::time::sleep(self.config.settle).await;
        }

        if stop == StopReason::Capped && surface.more_control() != MoreControl::Enabled {
            stop = StopReason::Exhausted;
        }

        match stop {
            StopReason::Capped => warn!(
                "Show more still enabled after {} activations, extracting what loaded",
                activations
            ),
            StopReason::Cancelled => warn!("Expansion cancelled after {} activations", activations),
            StopReason::Exhausted => {}
        }

        let owner = surface.owner();
        let records = extract::extract(&owner, &surface.entries());
        info!(
            "Extracted {} rows after {} activations ({:?})",
            records.len(),
            activations,
            stop
        );

        Ok(Expanded {
            records,
            activations,
            stop,
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::error::ScholarError;
    use crate::surface::{OwnerInfo, RawEntry};

    /// Surface whose control disappears after `pages` activations.
    pub(crate) struct FakeSurface {
        pub address: String,
        pub pages: usize,
        pub activations: usize,
        pub scrolls: usize,
        pub never_exhausts: bool,
        pub fail_on: Option<usize>,
    }

    impl FakeSurface {
        pub(crate) fn new(pages: usize) -> Self {
            Self {
                address: "https://scholar.google.com/citations?user=fake&hl=en".into(),
                pages,
                activations: 0,
                scrolls: 0,
                never_exhausts: false,
                fail_on: None,
            }
        }
    }

    #[async_trait]
    impl ListSurface for FakeSurface {
        fn owner(&self) -> OwnerInfo {
            OwnerInfo {
                name: Some("Fake Author".into()),
                affiliation: None,
                address: self.address.clone(),
            }
        }

        fn more_control(&self) -> MoreControl {
            if self.never_exhausts || self.activations < self.pages {
                MoreControl::Enabled
            } else {
                MoreControl::Absent
            }
        }

        async fn activate_more(&mut self) -> Result<()> {
            if self.fail_on == Some(self.activations) {
                return Err(ScholarError::Delivery("connection reset".into()));
            }
            self.activations += 1;
            Ok(())
        }

        async fn scroll_to_end(&mut self) -> Result<()> {
            self.scrolls += 1;
            Ok(())
        }

        fn entries(&self) -> Vec<RawEntry> {
            (0..=self.activations)
                .map(|i| RawEntry {
                    title: Some(format!("Paper {}", i)),
                    year_label: Some("2020".into()),
                    citation_label: Some(i.to_string()),
                    ..Default::default()
                })
                .collect()
        }
    }

    fn fast(max_iterations: usize) -> Paginator {
        Paginator::new(PaginationConfig {
            max_iterations,
            settle: Duration::ZERO,
        })
    }

    #[tokio::test]
    async fn stops_when_control_disappears() {
        let mut s = FakeSurface::new(3);
        let out = fast(200).expand_and_extract(&mut s).await.unwrap();
        assert_eq!(out.activations, 3);
        assert_eq!(s.activations, 3);
        assert_eq!(s.scrolls, 3);
        assert_eq!(out.stop, StopReason::Exhausted);
        assert_eq!(out.records.len(), 4);
    }

    #[tokio::test]
    async fn single_page_needs_no_activation() {
        let mut s = FakeSurface::new(0);
        let out = fast(200).expand_and_extract(&mut s).await.unwrap();
        assert_eq!(out.activations, 0);
        assert_eq!(out.records.len(), 1);
    }

    #[tokio::test]
    async fn cap_is_not_an_error() {
        let mut s = FakeSurface::new(0);
        s.never_exhausts = true;
        let out = fast(5).expand_and_extract(&mut s).await.unwrap();
        assert_eq!(out.activations, 5);
        assert_eq!(out.stop, StopReason::Capped);
        assert_eq!(out.records.len(), 6);
    }

    #[tokio::test]
    async fn cancellation_checked_between_iterations() {
        let cancel = CancelFlag::default();
        cancel.cancel();
        let mut s = FakeSurface::new(10);
        let out = fast(200)
            .with_cancel(cancel)
            .expand_and_extract(&mut s)
            .await
            .unwrap();
        assert_eq!(out.activations, 0);
        assert_eq!(out.stop, StopReason::Cancelled);
    }

    #[tokio::test]
    async fn surface_fault_propagates() {
        let mut s = FakeSurface::new(5);
        s.fail_on = Some(2);
        let err = fast(200).expand_and_extract(&mut s).await.err().unwrap();
        assert!(matches!(err, ScholarError::Delivery(_)));
        assert_eq!(s.activations, 2);
    }
}
