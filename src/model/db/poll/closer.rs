use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Duration, Utc};
use log::{debug, error, info, trace, warn};
use mongodb::{bson::doc, error::Error as DbError, Database};
use rocket::{
    fairing::{Fairing, Info, Kind},
    futures::{
        future::{BoxFuture, FutureExt},
        TryStreamExt,
    },
    http::Status,
    tokio::sync::Mutex,
    Build, Rocket,
};

use crate::{
    error::{Error, Result},
    model::{
        db::poll::Poll,
        mongodb::{Coll, Id},
    },
    scheduled_task::ScheduledTask,
};

/// Seconds to wait before retrying a close that failed.
const RETRY_INTERVAL_SECONDS: i64 = 300;

/// Map from poll IDs to closer tasks.
type TaskMap = HashMap<Id, ScheduledTask<Result<()>>>;

/// Poll closers: scheduled tasks that deactivate polls once their end time passes.
#[derive(Clone, Default)]
pub struct PollClosers {
    tasks: Arc<Mutex<TaskMap>>,
}

impl PollClosers {
    /// Create an empty set of poll closers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Does the given poll have a closer scheduled?
    pub async fn has_closer(&self, poll_id: Id) -> bool {
        self.tasks.lock().await.contains_key(&poll_id)
    }

    /// Schedule a closer for every active poll with an end time.
    pub async fn schedule_polls(&self, db: &Database) -> std::result::Result<(), DbError> {
        let filter = doc! {
            "is_active": true,
            "end_time": { "$ne": null },
        };
        let polls: Vec<Poll> = Coll::<Poll>::from_db(db)
            .find(filter, None)
            .await?
            .try_collect()
            .await?;
        let count = polls.len();
        for poll in polls {
            self.schedule_poll(Coll::from_db(db), &poll).await;
        }
        debug!("Scheduled closers for {count} polls");
        Ok(())
    }

    /// Schedule a closer for the given poll, replacing any existing one.
    /// Polls that are inactive or open-ended just lose their closer.
    pub async fn schedule_poll(&self, polls: Coll<Poll>, poll: &Poll) {
        let mut tasks = self.tasks.lock().await;
        if let Some(task) = tasks.remove(&poll.id) {
            if task.cancel().await {
                // A closer removes itself before finishing, so this means
                // someone else's bookkeeping went wrong.
                warn!("Closer for poll {} had already finished when rescheduled", poll.id);
            }
        }
        let end_time = match poll.end_time {
            Some(end_time) if poll.is_active => end_time,
            _ => return,
        };
        let closer = Self::closer(poll.id, polls, self.tasks.clone());
        tasks.insert(poll.id, ScheduledTask::new(closer, end_time));
        trace!("Closer for poll {} scheduled at {end_time}", poll.id);
    }

    /// Drop the closer for a poll that was withdrawn or deleted.
    pub async fn cancel_poll(&self, poll_id: Id) {
        let task = self.tasks.lock().await.remove(&poll_id);
        if let Some(task) = task {
            task.cancel().await;
            trace!("Closer for poll {poll_id} cancelled");
        }
    }

    /// Close the given poll now: run its scheduled closer early, or a fresh
    /// one if none is scheduled.
    pub async fn close_now(&self, polls: Coll<Poll>, poll_id: Id) -> Result<()> {
        let task = self.tasks.lock().await.remove(&poll_id);
        // The lock is released here, as the closer needs it too.
        match task {
            Some(closer) => {
                closer.trigger_now();
                closer.await.unwrap_or_else(|_| {
                    Err(Error::Status(
                        Status::InternalServerError,
                        format!("Failed to close poll {poll_id}"),
                    ))
                })
            }
            None => Self::closer(poll_id, polls, self.tasks.clone()).await,
        }
    }

    /// Build the future that deactivates a poll, retrying on failure.
    /// It is recursive through the retry, hence the `BoxFuture`.
    fn closer(
        poll_id: Id,
        polls: Coll<Poll>,
        tasks: Arc<Mutex<TaskMap>>,
    ) -> BoxFuture<'static, Result<()>> {
        async fn close(poll_id: Id, polls: &Coll<Poll>) -> Result<()> {
            let filter = doc! {
                "_id": poll_id,
                "is_active": true,
            };
            let update = doc! {
                "$set": { "is_active": false }
            };
            let result = polls.update_one(filter, update, None).await?;
            if result.modified_count == 1 {
                info!("Poll {poll_id} reached its end time and was closed");
            } else {
                debug!("Closer for poll {poll_id} had nothing to do");
            }
            Ok(())
        }

        async move {
            let result = close(poll_id, &polls).await;
            match result {
                Ok(()) => {
                    tasks.lock().await.remove(&poll_id);
                }
                Err(ref e) => {
                    error!("Closing poll {poll_id} failed: {e}");
                    let retry = Self::closer(poll_id, polls, tasks.clone());
                    let retry_time = Utc::now() + Duration::seconds(RETRY_INTERVAL_SECONDS);
                    tasks
                        .lock()
                        .await
                        .insert(poll_id, ScheduledTask::new(retry, retry_time));
                    warn!("Closing poll {poll_id} will be retried in {RETRY_INTERVAL_SECONDS} seconds");
                }
            }
            result
        }
        .boxed()
    }
}

/// A fairing that schedules closers for all active polls during Rocket
/// ignition, and places a [`PollClosers`] into managed state.
/// It needs the database in managed state, so must be attached after the
/// fairing responsible for that.
pub struct PollCloserFairing;

#[rocket::async_trait]
impl Fairing for PollCloserFairing {
    fn info(&self) -> Info {
        Info {
            name: "Poll Closers",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, rocket: Rocket<Build>) -> rocket::fairing::Result {
        info!("Scheduling poll closers...");
        let closers = PollClosers::new();
        let db = match rocket.state::<Database>() {
            Some(db) => db,
            None => {
                error!("Database was not available when scheduling poll closers");
                return Err(rocket);
            }
        };
        if let Err(e) = closers.schedule_polls(db).await {
            error!("Failed to schedule poll closers: {e}");
            return Err(rocket);
        }
        info!("...poll closers scheduled!");

        Ok(rocket.manage(closers))
    }
}
