//! Serialized writes to the session store.
//!
//! Every save, rename and delete of a controller goes through one queue and
//! runs one at a time, in order. Saves are full replaces, so a queued save
//! is overwritten by a newer one for the same conversation instead of
//! queueing both.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use backoff::ExponentialBackoffBuilder;
use backoff::future::retry;
use counsel_model::{DeleteRequest, LoadRequest, Message, Role, SaveRequest};

use crate::Failure;
use crate::service_client::{StoreClient, bounded};

const TITLE_LIMIT: usize = 50;

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum WriteJob {
    /// Saves a full conversation. `generation` is set when the payload
    /// comes from a local conversation, so the identifier assigned by an
    /// earlier save of it can be filled in.
    Save {
        generation: Option<u64>,
        request: SaveRequest,
    },
    /// Loads a stored conversation and saves it back with a new title.
    Rename {
        conversation_id: String,
        title: String,
    },
    Delete {
        conversation_id: String,
    },
}

#[derive(Debug)]
struct Queued {
    id: u64,
    job: WriteJob,
}

#[derive(Debug, Default)]
pub(crate) struct WriteQueue {
    queued: VecDeque<Queued>,
    in_flight: Option<u64>,
    /// Identifiers assigned to local conversations, by generation.
    assigned: HashMap<u64, String>,
    next_id: u64,
}

impl WriteQueue {
    /// Queues a job and returns the identifier of the job that will carry
    /// it out, which is an already queued one if the job was merged.
    pub fn push(&mut self, job: WriteJob) -> u64 {
        match job {
            WriteJob::Save {
                generation,
                request,
            } => {
                let pos = self.queued.iter().position(|queued| {
                    let WriteJob::Save {
                        generation: queued_generation,
                        ..
                    } = &queued.job
                    else {
                        return false;
                    };
                    let same_generation =
                        generation.is_some() && generation == *queued_generation;
                    let target = self.resolve(generation, &request);
                    same_generation
                        || (target.is_some() && target == self.target(&queued.job))
                });
                let job = WriteJob::Save {
                    generation,
                    request,
                };
                match pos {
                    Some(pos) => {
                        trace!("coalescing save into a queued one");
                        let queued = &mut self.queued[pos];
                        queued.job = job;
                        queued.id
                    }
                    None => self.enqueue(job),
                }
            }
            WriteJob::Rename {
                conversation_id,
                title,
            } => {
                let pos = self.queued.iter().position(|queued| {
                    matches!(queued.job, WriteJob::Save { .. })
                        && self.target(&queued.job) == Some(conversation_id.as_str())
                });
                if let Some(pos) = pos {
                    let queued = &mut self.queued[pos];
                    if let WriteJob::Save { request, .. } = &mut queued.job {
                        request.title = Some(title);
                    }
                    return queued.id;
                }
                self.enqueue(WriteJob::Rename {
                    conversation_id,
                    title,
                })
            }
            WriteJob::Delete { conversation_id } => {
                let before = self.queued.len();
                let assigned = &self.assigned;
                self.queued.retain(|queued| {
                    let target = match &queued.job {
                        WriteJob::Save {
                            generation,
                            request,
                        } => resolve(assigned, *generation, request),
                        WriteJob::Rename {
                            conversation_id, ..
                        } => Some(conversation_id.as_str()),
                        WriteJob::Delete { .. } => None,
                    };
                    target != Some(conversation_id.as_str())
                });
                let dropped = before - self.queued.len();
                if dropped > 0 {
                    debug!("dropped {dropped} queued writes of a deleted conversation");
                }
                self.enqueue(WriteJob::Delete { conversation_id })
            }
        }
    }

    /// Takes the next job to run, unless one is already running.
    pub fn next(&mut self) -> Option<(u64, WriteJob)> {
        if self.in_flight.is_some() {
            return None;
        }
        let Queued { id, mut job } = self.queued.pop_front()?;
        if let WriteJob::Save {
            generation: Some(generation),
            request,
        } = &mut job
        {
            if request.conversation_id.is_none() {
                request.conversation_id = self.assigned.get(&*generation).cloned();
            }
        }
        self.in_flight = Some(id);
        Some((id, job))
    }

    /// Marks the running job as done.
    #[inline]
    pub fn finish(&mut self, id: u64) {
        if self.in_flight == Some(id) {
            self.in_flight = None;
        }
    }

    /// Records the identifier the store assigned to a local conversation.
    #[inline]
    pub fn assign(&mut self, generation: u64, conversation_id: String) {
        self.assigned.insert(generation, conversation_id);
    }

    /// Forgets the identifiers of generations older than `current` that
    /// no queued save refers to.
    pub fn prune(&mut self, current: u64) {
        let queued = &self.queued;
        self.assigned.retain(|&generation, _| {
            generation >= current
                || queued.iter().any(|job| {
                    matches!(
                        job.job,
                        WriteJob::Save { generation: Some(g), .. } if g == generation
                    )
                })
        });
    }

    /// Returns the number of queued and running jobs.
    #[inline]
    pub fn len(&self) -> usize {
        self.queued.len() + usize::from(self.in_flight.is_some())
    }

    fn enqueue(&mut self, job: WriteJob) -> u64 {
        self.next_id += 1;
        let id = self.next_id;
        self.queued.push_back(Queued { id, job });
        id
    }

    #[inline]
    fn resolve<'a>(
        &'a self,
        generation: Option<u64>,
        request: &'a SaveRequest,
    ) -> Option<&'a str> {
        resolve(&self.assigned, generation, request)
    }

    fn target<'a>(&'a self, job: &'a WriteJob) -> Option<&'a str> {
        match job {
            WriteJob::Save {
                generation,
                request,
            } => self.resolve(*generation, request),
            WriteJob::Rename {
                conversation_id, ..
            }
            | WriteJob::Delete { conversation_id } => Some(conversation_id.as_str()),
        }
    }
}

fn resolve<'a>(
    assigned: &'a HashMap<u64, String>,
    generation: Option<u64>,
    request: &'a SaveRequest,
) -> Option<&'a str> {
    request
        .conversation_id
        .as_deref()
        .or_else(|| assigned.get(&generation?).map(String::as_str))
}

/// The result of a finished write.
#[derive(Debug)]
pub(crate) enum WriteOutcome {
    Saved {
        generation: Option<u64>,
        result: Result<String, Failure>,
    },
    Renamed {
        conversation_id: String,
        result: Result<(), Failure>,
    },
    Deleted {
        conversation_id: String,
        result: Result<(), Failure>,
    },
}

/// Carries out write jobs against the session store.
pub(crate) struct Writer {
    pub store: StoreClient,
    pub user_identifier: String,
    pub timeout: Duration,
    pub retry_interval: Duration,
    pub retry_budget: Duration,
}

impl Writer {
    pub async fn run(self, job: WriteJob) -> WriteOutcome {
        match job {
            WriteJob::Save {
                generation,
                request,
            } => WriteOutcome::Saved {
                generation,
                result: self.save(request).await,
            },
            WriteJob::Rename {
                conversation_id,
                title,
            } => {
                let result = self.rename(&conversation_id, title).await;
                WriteOutcome::Renamed {
                    conversation_id,
                    result,
                }
            }
            WriteJob::Delete { conversation_id } => {
                let request = DeleteRequest {
                    user_identifier: self.user_identifier.clone(),
                    conversation_id: conversation_id.clone(),
                };
                let result =
                    bounded(self.timeout, self.store.delete(request)).await;
                WriteOutcome::Deleted {
                    conversation_id,
                    result,
                }
            }
        }
    }

    /// Saves, retrying transient failures with exponential backoff.
    async fn save(&self, request: SaveRequest) -> Result<String, Failure> {
        let backoff = ExponentialBackoffBuilder::new()
            .with_initial_interval(self.retry_interval)
            .with_max_elapsed_time(Some(self.retry_budget))
            .build();
        let timeout = self.timeout;
        retry(backoff, || {
            let store = self.store.clone();
            let request = request.clone();
            async move {
                bounded(timeout, store.save(request)).await.map_err(|failure| {
                    if failure.kind().is_transient() {
                        debug!("save failed, retrying: {failure}");
                        backoff::Error::transient(failure)
                    } else {
                        backoff::Error::permanent(failure)
                    }
                })
            }
        })
        .await
    }

    async fn rename(
        &self,
        conversation_id: &str,
        title: String,
    ) -> Result<(), Failure> {
        let request = LoadRequest {
            user_identifier: self.user_identifier.clone(),
            conversation_id: conversation_id.to_owned(),
        };
        let stored = bounded(self.timeout, self.store.load(request)).await?;
        let request = SaveRequest {
            user_identifier: self.user_identifier.clone(),
            topic_id: stored.topic_id,
            topic_display_name: stored.topic_display_name,
            messages: stored.messages,
            conversation_id: Some(stored.conversation_id),
            title: Some(title),
        };
        bounded(self.timeout, self.store.save(request)).await?;
        Ok(())
    }
}

/// Derives a title from the first user message: its first line, cut to 50
/// characters with a trailing `...`.
pub(crate) fn default_title(messages: &[Message]) -> Option<String> {
    let first = messages.iter().find(|msg| msg.role() == Role::User)?;
    let line = first.content().lines().next()?.trim();
    if line.is_empty() {
        return None;
    }
    if line.chars().count() <= TITLE_LIMIT {
        return Some(line.to_owned());
    }
    let mut title: String = line.chars().take(TITLE_LIMIT - 3).collect();
    title.truncate(title.trim_end().len());
    title.push_str("...");
    Some(title)
}
