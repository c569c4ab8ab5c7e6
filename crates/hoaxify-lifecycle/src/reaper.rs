//! Attachment claim and reclamation.
//!
//! An upload starts unclaimed. The first hoax that references it claims it
//! for good. Anything still unclaimed after the grace window is reaped:
//! blob first, then record.
//!
//! # Claim vs. reap
//!
//! A claim and a sweep can look at the same row at the same time. The sweep
//! does not decide eligibility and delete in separate steps; it first
//! *condemns* every eligible row in one atomic store call. A condemned row
//! can no longer be claimed, and a claimed row can no longer be condemned,
//! so exactly one side wins per row. Blob and record deletion happen after
//! that decision and only ever touch condemned rows.
//!
//! If the process dies between condemning and deleting, the rows stay
//! condemned and the next sweep finishes the job.
//!
//! Store calls made from the async paths run on the blocking pool.

use std::sync::Arc;
use std::time::Duration;

use chrono::TimeDelta;
use tracing::{debug, info, warn};
use uuid::Uuid;

use hoaxify_types::models::AttachmentRecord;

use crate::clock::Clock;
use crate::error::LifecycleError;
use crate::store::{AttachmentStore, BlobStore};
use crate::sweep::{self, Sweep, SweepHandle};

pub struct AttachmentReaper {
    store: Arc<dyn AttachmentStore>,
    blobs: Arc<dyn BlobStore>,
    clock: Arc<dyn Clock>,
    grace: TimeDelta,
}

impl AttachmentReaper {
    pub fn new(
        store: Arc<dyn AttachmentStore>,
        blobs: Arc<dyn BlobStore>,
        clock: Arc<dyn Clock>,
        grace: TimeDelta,
    ) -> Self {
        Self {
            store,
            blobs,
            clock,
            grace,
        }
    }

    /// Associates an upload with `hoax_id` unless something already did.
    ///
    /// Unknown, reaped and already-claimed attachments are silent no-ops so a
    /// stale id never fails hoax creation. Returns whether this call won.
    pub fn claim(&self, attachment_id: Uuid, hoax_id: Uuid) -> Result<bool, LifecycleError> {
        let claimed = self.store.claim_attachment(attachment_id, hoax_id)?;
        if claimed {
            debug!(%attachment_id, %hoax_id, "attachment claimed");
        } else {
            debug!(%attachment_id, %hoax_id, "attachment claim ignored");
        }
        Ok(claimed)
    }

    /// Deletes whatever `hoax_id` claimed. Used when the hoax itself goes
    /// away; this is the only path that removes claimed attachments.
    pub async fn release_for_hoax(&self, hoax_id: Uuid) -> Result<usize, LifecycleError> {
        let claimed = self.on_store(move |store| store.attachments_for_hoax(hoax_id)).await?;
        for record in &claimed {
            self.remove(record).await?;
        }
        Ok(claimed.len())
    }

    /// One reclamation pass over unclaimed uploads older than the grace
    /// window.
    pub async fn reap_unclaimed(&self) -> Result<usize, LifecycleError> {
        let cutoff = self.clock.now() - self.grace;
        let condemned = self.on_store(move |store| store.condemn_unclaimed(cutoff)).await?;

        for record in &condemned {
            self.remove(record).await?;
        }

        if !condemned.is_empty() {
            info!(count = condemned.len(), "reaped unclaimed attachments");
        }
        Ok(condemned.len())
    }

    /// Starts the background reaper on `interval`.
    pub fn start_sweep(self: &Arc<Self>, interval: Duration) -> SweepHandle {
        sweep::spawn(Arc::clone(self), interval)
    }

    /// Blob first, then record. A blob that cannot be deleted is logged and
    /// the record is removed anyway.
    async fn remove(&self, record: &AttachmentRecord) -> Result<(), LifecycleError> {
        if let Err(e) = self.blobs.delete(&record.filename).await {
            warn!(
                attachment_id = %record.id,
                filename = %record.filename,
                error = %e,
                "attachment blob delete failed, dropping record anyway"
            );
        }
        let id = record.id;
        self.on_store(move |store| store.delete_attachment(id)).await?;
        Ok(())
    }

    async fn on_store<T, F>(&self, f: F) -> Result<T, LifecycleError>
    where
        F: FnOnce(&dyn AttachmentStore) -> anyhow::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let store = Arc::clone(&self.store);
        Ok(tokio::task::spawn_blocking(move || f(store.as_ref())).await??)
    }
}

impl Sweep for AttachmentReaper {
    fn name(&self) -> &'static str {
        "unclaimed-attachments"
    }

    async fn sweep_once(&self) -> Result<usize, LifecycleError> {
        self.reap_unclaimed().await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use super::*;
    use crate::clock::ManualClock;
    use crate::memory::{MemoryAttachments, MemoryBlobs};

    struct Fixture {
        store: Arc<MemoryAttachments>,
        blobs: Arc<MemoryBlobs>,
        clock: Arc<ManualClock>,
        reaper: Arc<AttachmentReaper>,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MemoryAttachments::default());
        let blobs = Arc::new(MemoryBlobs::default());
        let clock = Arc::new(ManualClock::default());
        let reaper = Arc::new(AttachmentReaper::new(
            store.clone(),
            blobs.clone(),
            clock.clone(),
            TimeDelta::hours(24),
        ));
        Fixture {
            store,
            blobs,
            clock,
            reaper,
        }
    }

    fn upload(f: &Fixture, filename: &str, age: TimeDelta) -> Uuid {
        f.blobs.put(filename);
        f.store.upload(filename, f.clock.now() - age)
    }

    #[test]
    fn first_claim_wins() {
        let f = fixture();
        let id = upload(&f, "a.png", TimeDelta::zero());
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();

        assert!(f.reaper.claim(id, first).unwrap());
        assert!(!f.reaper.claim(id, second).unwrap());
        assert!(!f.reaper.claim(id, first).unwrap());

        assert_eq!(f.store.get(id).unwrap().hoax_id, Some(first));
    }

    #[test]
    fn claiming_unknown_attachment_is_a_no_op() {
        let f = fixture();
        assert!(!f.reaper.claim(Uuid::new_v4(), Uuid::new_v4()).unwrap());
    }

    #[tokio::test]
    async fn reaps_only_unclaimed_uploads_past_grace() {
        let f = fixture();
        let stale = upload(&f, "stale.png", TimeDelta::hours(25));
        let fresh = upload(&f, "fresh.png", TimeDelta::hours(23));

        assert_eq!(f.reaper.reap_unclaimed().await.unwrap(), 1);

        assert!(f.store.get(stale).is_none());
        assert!(!f.blobs.contains("stale.png"));
        assert!(f.store.get(fresh).is_some());
        assert!(f.blobs.contains("fresh.png"));
    }

    #[tokio::test]
    async fn claimed_upload_survives_any_age() {
        let f = fixture();
        let id = upload(&f, "keep.jpg", TimeDelta::zero());
        f.clock.advance(TimeDelta::minutes(1));
        assert!(f.reaper.claim(id, Uuid::new_v4()).unwrap());

        f.clock.advance(TimeDelta::hours(25));
        assert_eq!(f.reaper.reap_unclaimed().await.unwrap(), 0);

        f.clock.advance(TimeDelta::days(365));
        assert_eq!(f.reaper.reap_unclaimed().await.unwrap(), 0);

        assert!(f.store.get(id).is_some());
        assert!(f.blobs.contains("keep.jpg"));
    }

    #[tokio::test]
    async fn reaped_upload_cannot_be_claimed() {
        let f = fixture();
        let id = upload(&f, "late.png", TimeDelta::hours(30));

        f.reaper.reap_unclaimed().await.unwrap();

        assert!(!f.reaper.claim(id, Uuid::new_v4()).unwrap());
        assert!(f.store.get(id).is_none());
    }

    #[tokio::test]
    async fn condemned_upload_cannot_be_claimed() {
        let f = fixture();
        let id = upload(&f, "doomed.png", TimeDelta::hours(30));

        // The sweep has decided but not yet deleted.
        let condemned = f.store.condemn_unclaimed(f.clock.now() - TimeDelta::hours(24)).unwrap();
        assert_eq!(condemned.len(), 1);

        assert!(!f.reaper.claim(id, Uuid::new_v4()).unwrap());

        // The next pass finishes the interrupted one.
        assert_eq!(f.reaper.reap_unclaimed().await.unwrap(), 1);
        assert!(f.store.get(id).is_none());
    }

    #[tokio::test]
    async fn blob_failure_still_drops_the_record() {
        let f = fixture();
        let id = upload(&f, "stuck.png", TimeDelta::hours(48));
        f.blobs.fail.store(true, Ordering::SeqCst);

        assert_eq!(f.reaper.reap_unclaimed().await.unwrap(), 1);

        assert_eq!(f.blobs.deleted(), vec!["stuck.png".to_string()]);
        assert!(f.store.get(id).is_none());
    }

    #[tokio::test]
    async fn missing_blob_counts_as_deleted() {
        let f = fixture();
        let id = f.store.upload("never-written.png", f.clock.now() - TimeDelta::hours(48));

        assert_eq!(f.reaper.reap_unclaimed().await.unwrap(), 1);
        assert!(f.store.get(id).is_none());
    }

    #[tokio::test]
    async fn release_removes_claimed_attachment() {
        let f = fixture();
        let hoax = Uuid::new_v4();
        let id = upload(&f, "post.png", TimeDelta::zero());
        f.reaper.claim(id, hoax).unwrap();

        assert_eq!(f.reaper.release_for_hoax(hoax).await.unwrap(), 1);

        assert!(f.store.get(id).is_none());
        assert!(!f.blobs.contains("post.png"));
        assert_eq!(f.reaper.release_for_hoax(hoax).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn store_calls_stay_off_the_runtime_thread() {
        let f = fixture();
        let hoax = Uuid::new_v4();
        let claimed = upload(&f, "mine.png", TimeDelta::zero());
        f.reaper.claim(claimed, hoax).unwrap();
        upload(&f, "orphan.png", TimeDelta::hours(48));

        f.reaper.release_for_hoax(hoax).await.unwrap();
        f.reaper.reap_unclaimed().await.unwrap();

        let runtime = std::thread::current().id();
        let threads = f.store.threads();
        // lookup + delete, then condemn + delete
        assert_eq!(threads.len(), 4);
        assert!(threads.iter().all(|t| *t != runtime));
    }

    #[tokio::test(start_paused = true)]
    async fn background_sweep_reaps_on_schedule() {
        let f = fixture();
        let id = upload(&f, "old.gif", TimeDelta::hours(25));

        let handle = f.reaper.start_sweep(Duration::from_secs(24 * 3600));
        tokio::time::sleep(Duration::from_secs(3600)).await;
        assert!(f.store.get(id).is_some());

        tokio::time::sleep(Duration::from_secs(24 * 3600)).await;
        assert!(f.store.get(id).is_none());

        handle.stop().await;
    }
}
