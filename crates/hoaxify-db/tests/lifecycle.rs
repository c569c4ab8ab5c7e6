//! Session and attachment lifecycles against a real SQLite schema.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{TimeDelta, Utc};
use uuid::Uuid;

use hoaxify_db::Database;
use hoaxify_db::models::NewUser;
use hoaxify_lifecycle::sessions::hash_token;
use hoaxify_lifecycle::{AttachmentReaper, BlobStore, Clock, ManualClock, SessionManager};
use hoaxify_types::models::AttachmentRecord;

#[derive(Default)]
struct Blobs {
    present: Mutex<HashSet<String>>,
}

impl Blobs {
    fn contains(&self, key: &str) -> bool {
        self.present.lock().unwrap().contains(key)
    }
}

#[async_trait]
impl BlobStore for Blobs {
    async fn delete(&self, key: &str) -> anyhow::Result<()> {
        self.present.lock().unwrap().remove(key);
        Ok(())
    }
}

struct Harness {
    db: Arc<Database>,
    clock: Arc<ManualClock>,
    blobs: Arc<Blobs>,
    sessions: SessionManager,
    reaper: AttachmentReaper,
}

fn harness() -> Harness {
    let db = Arc::new(Database::open_in_memory().unwrap());
    let clock = Arc::new(ManualClock::new(Utc::now()));
    let blobs = Arc::new(Blobs::default());
    let sessions = SessionManager::new(db.clone(), clock.clone(), TimeDelta::days(7));
    let reaper = AttachmentReaper::new(db.clone(), blobs.clone(), clock.clone(), TimeDelta::hours(24));
    Harness {
        db,
        clock,
        blobs,
        sessions,
        reaper,
    }
}

impl Harness {
    fn upload(&self, filename: &str) -> Uuid {
        let id = Uuid::new_v4();
        self.db
            .insert_attachment(&AttachmentRecord {
                id,
                filename: filename.to_string(),
                file_type: Some("image/png".into()),
                uploaded_at: self.clock.now(),
                hoax_id: None,
            })
            .unwrap();
        self.blobs.present.lock().unwrap().insert(filename.to_string());
        id
    }

    fn hoax(&self) -> Uuid {
        let user = Uuid::new_v4();
        self.db
            .create_user(&NewUser {
                id: user,
                username: "poster",
                email: &format!("{user}@mail.com"),
                password_hash: "hash",
                activation_token: &user.to_string(),
                created_at: self.clock.now(),
            })
            .unwrap();
        let hoax = Uuid::new_v4();
        self.db
            .insert_hoax(hoax, user, "hoax with a picture", self.clock.now())
            .unwrap();
        hoax
    }
}

#[test]
fn idle_token_expires_before_sweep_and_is_swept_after() {
    let h = harness();
    let user = Uuid::new_v4();
    let token = h.sessions.issue(user).unwrap();

    h.clock.advance(TimeDelta::days(8));

    assert_eq!(h.sessions.validate_and_touch(&token).unwrap(), None);
    assert!(h.db.get_token(&hash_token(&token)).unwrap().is_some());

    assert_eq!(h.sessions.purge_expired().unwrap(), 1);
    assert!(h.db.get_token(&hash_token(&token)).unwrap().is_none());
}

#[test]
fn touch_refreshes_last_active_at() {
    let h = harness();
    let user = Uuid::new_v4();
    let token = h.sessions.issue(user).unwrap();

    h.clock.advance(TimeDelta::days(4));
    assert_eq!(h.sessions.validate_and_touch(&token).unwrap(), Some(user));

    let row = h.db.get_token(&hash_token(&token)).unwrap().unwrap();
    assert!(h.clock.now() - row.last_active_at < TimeDelta::seconds(2));

    // Another six days is fine because the window slid.
    h.clock.advance(TimeDelta::days(6));
    assert_eq!(h.sessions.validate_and_touch(&token).unwrap(), Some(user));
}

#[test]
fn revoke_all_leaves_other_users_alone() {
    let h = harness();
    let alice = Uuid::new_v4();
    let bob = Uuid::new_v4();
    for _ in 0..4 {
        h.sessions.issue(alice).unwrap();
    }
    let bob_token = h.sessions.issue(bob).unwrap();
    h.sessions.issue(bob).unwrap();

    h.sessions.revoke_all(alice).unwrap();

    assert_eq!(h.db.count_tokens_for_user(alice).unwrap(), 0);
    assert_eq!(h.db.count_tokens_for_user(bob).unwrap(), 2);
    assert_eq!(h.sessions.validate_and_touch(&bob_token).unwrap(), Some(bob));
}

#[test]
fn revoke_twice_is_the_same_as_once() {
    let h = harness();
    let user = Uuid::new_v4();
    let token = h.sessions.issue(user).unwrap();
    let other = h.sessions.issue(user).unwrap();

    h.sessions.revoke(&token).unwrap();
    h.sessions.revoke(&token).unwrap();

    assert_eq!(h.db.count_tokens_for_user(user).unwrap(), 1);
    assert_eq!(h.sessions.validate_and_touch(&other).unwrap(), Some(user));
}

#[test]
fn second_claim_keeps_first_hoax() {
    let h = harness();
    let attachment = h.upload("first.png");
    let first = h.hoax();
    let second = h.hoax();

    assert!(h.reaper.claim(attachment, first).unwrap());
    assert!(!h.reaper.claim(attachment, second).unwrap());

    let row = h.db.get_attachment(attachment).unwrap().unwrap();
    assert_eq!(row.hoax_id, Some(first));
}

#[tokio::test]
async fn claimed_attachment_outlives_grace_window() {
    let h = harness();
    let attachment = h.upload("claimed.png");
    h.clock.advance(TimeDelta::minutes(1));
    let hoax = h.hoax();
    h.reaper.claim(attachment, hoax).unwrap();

    h.clock.advance(TimeDelta::hours(25));
    assert_eq!(h.reaper.reap_unclaimed().await.unwrap(), 0);

    assert!(h.db.get_attachment(attachment).unwrap().is_some());
    assert!(h.blobs.contains("claimed.png"));
}

#[tokio::test]
async fn grace_window_boundary() {
    let h = harness();
    let old = h.upload("a.png");
    h.clock.advance(TimeDelta::hours(2));
    let young = h.upload("b.png");
    h.clock.advance(TimeDelta::hours(23));

    // a.png is 25h old, b.png 23h.
    assert_eq!(h.reaper.reap_unclaimed().await.unwrap(), 1);

    assert!(h.db.get_attachment(old).unwrap().is_none());
    assert!(!h.blobs.contains("a.png"));
    assert!(h.db.get_attachment(young).unwrap().is_some());
    assert!(h.blobs.contains("b.png"));
}

#[tokio::test]
async fn claim_after_reap_is_a_no_op() {
    let h = harness();
    let attachment = h.upload("late.png");
    h.clock.advance(TimeDelta::hours(30));

    h.reaper.reap_unclaimed().await.unwrap();
    let hoax = h.hoax();

    assert!(!h.reaper.claim(attachment, hoax).unwrap());
    assert!(h.db.get_attachment(attachment).unwrap().is_none());
}

#[tokio::test]
async fn claim_and_reap_race_has_one_winner() {
    let h = Arc::new(harness());
    let mut attachments = Vec::new();
    for i in 0..50 {
        attachments.push(h.upload(&format!("race-{i}.png")));
    }
    let hoax = h.hoax();
    h.clock.advance(TimeDelta::hours(25));

    let claimer = {
        let h = h.clone();
        let attachments = attachments.clone();
        std::thread::spawn(move || {
            attachments
                .iter()
                .filter(|id| h.reaper.claim(**id, hoax).unwrap())
                .count()
        })
    };
    let reaped = h.reaper.reap_unclaimed().await.unwrap();
    let claimed = claimer.join().unwrap();

    assert_eq!(claimed + reaped, attachments.len());
    for id in attachments {
        if let Some(row) = h.db.get_attachment(id).unwrap() {
            assert_eq!(row.hoax_id, Some(hoax));
        }
    }
}

#[tokio::test]
async fn deleting_a_hoax_releases_its_attachment() {
    let h = harness();
    let attachment = h.upload("post.png");
    let hoax = h.hoax();
    h.reaper.claim(attachment, hoax).unwrap();

    assert_eq!(h.reaper.release_for_hoax(hoax).await.unwrap(), 1);
    h.db.delete_hoax(hoax).unwrap();

    assert!(h.db.get_attachment(attachment).unwrap().is_none());
    assert!(!h.blobs.contains("post.png"));
}
