use crate::application::mirror::{self, MirrorService, SyncError};
use crate::domain::calendar;
use crate::domain::models::Weekday;
use crate::infrastructure::document_store::{DocumentStore, SubscriptionHandle};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

pub type NowProvider = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SeedReport {
    pub reconciled: Vec<String>,
}

pub struct WatchSession {
    handles: Vec<SubscriptionHandle>,
    cancelled: Arc<AtomicBool>,
}

impl WatchSession {
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        for handle in &self.handles {
            handle.unsubscribe();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    pub fn subscription_count(&self) -> usize {
        self.handles.len()
    }
}

pub struct RoutineWatcher<S: DocumentStore + 'static> {
    store: Arc<S>,
    mirror: Arc<MirrorService<S>>,
    zone: Tz,
    now_provider: NowProvider,
}

impl<S: DocumentStore + 'static> RoutineWatcher<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            mirror: Arc::new(MirrorService::new(Arc::clone(&store))),
            store,
            zone: calendar::DEFAULT_ZONE,
            now_provider: Arc::new(Utc::now),
        }
    }

    pub fn with_zone(mut self, zone: Tz) -> Self {
        self.zone = zone;
        self
    }

    pub fn with_now_provider(mut self, now_provider: NowProvider) -> Self {
        self.now_provider = now_provider;
        self
    }

    pub fn mirror(&self) -> &Arc<MirrorService<S>> {
        &self.mirror
    }

    pub fn watch(&self, uid: &str) -> Result<WatchSession, SyncError> {
        let cancelled = Arc::new(AtomicBool::new(false));
        let guards: Arc<Mutex<HashMap<Weekday, Arc<tokio::sync::Mutex<()>>>>> =
            Arc::new(Mutex::new(HashMap::new()));

        let mut handles: Vec<SubscriptionHandle> = Vec::with_capacity(14);
        for weekday in Weekday::ALL {
            let paths = [
                mirror::template_entries_path(uid, weekday),
                mirror::template_doc_path(uid, weekday),
            ];
            for path in paths {
                let context = WatchContext {
                    mirror: Arc::clone(&self.mirror),
                    uid: uid.to_string(),
                    zone: self.zone,
                    now_provider: Arc::clone(&self.now_provider),
                    cancelled: Arc::clone(&cancelled),
                    guards: Arc::clone(&guards),
                };
                let subscribed = self.store.subscribe(
                    &path,
                    Arc::new(move || {
                        let context = context.clone();
                        tokio::spawn(async move {
                            context.resync(weekday).await;
                        });
                    }),
                );
                match subscribed {
                    Ok(handle) => handles.push(handle),
                    Err(error) => {
                        for handle in &handles {
                            handle.unsubscribe();
                        }
                        return Err(error.into());
                    }
                }
            }
        }
        Ok(WatchSession { handles, cancelled })
    }

    pub async fn seed_window(&self, uid: &str) -> Result<SeedReport, SyncError> {
        let today = calendar::today_start(self.zone, (self.now_provider)());
        let window = calendar::window_dates(today);
        let attempted = window.len();

        let mut reconciled = Vec::new();
        let mut failures = Vec::new();
        for (weekday, date_iso) in window {
            match self.mirror.reconcile_date(uid, weekday, &date_iso).await {
                Ok(_) => reconciled.push(date_iso),
                Err(error) => {
                    log::warn!("seed reconcile failed for {uid} {weekday} {date_iso}: {error}");
                    failures.push((date_iso, error.to_string()));
                }
            }
        }

        if failures.is_empty() {
            Ok(SeedReport { reconciled })
        } else {
            Err(SyncError::PartialWindow {
                attempted,
                failures,
            })
        }
    }
}

struct WatchContext<S: DocumentStore + 'static> {
    mirror: Arc<MirrorService<S>>,
    uid: String,
    zone: Tz,
    now_provider: NowProvider,
    cancelled: Arc<AtomicBool>,
    guards: Arc<Mutex<HashMap<Weekday, Arc<tokio::sync::Mutex<()>>>>>,
}

impl<S: DocumentStore + 'static> Clone for WatchContext<S> {
    fn clone(&self) -> Self {
        Self {
            mirror: Arc::clone(&self.mirror),
            uid: self.uid.clone(),
            zone: self.zone,
            now_provider: Arc::clone(&self.now_provider),
            cancelled: Arc::clone(&self.cancelled),
            guards: Arc::clone(&self.guards),
        }
    }
}

impl<S: DocumentStore + 'static> WatchContext<S> {
    // Concurrent notifications for the same weekday funnel through one
    // async mutex; reconciliation converges regardless, the guard just
    // avoids redundant store traffic.
    fn guard_for(&self, weekday: Weekday) -> Option<Arc<tokio::sync::Mutex<()>>> {
        let mut guards = self.guards.lock().ok()?;
        Some(Arc::clone(
            guards.entry(weekday).or_insert_with(|| Arc::new(tokio::sync::Mutex::new(()))),
        ))
    }

    async fn resync(self, weekday: Weekday) {
        if self.cancelled.load(Ordering::SeqCst) {
            return;
        }
        let Some(guard) = self.guard_for(weekday) else {
            return;
        };
        let _serialized = guard.lock().await;
        if self.cancelled.load(Ordering::SeqCst) {
            return;
        }

        let today = calendar::today_start(self.zone, (self.now_provider)());
        for date_iso in calendar::projected_dates(weekday, today) {
            if let Err(error) = self
                .mirror
                .reconcile_date(&self.uid, weekday, &date_iso)
                .await
            {
                log::warn!(
                    "reconcile failed for {} {weekday} {date_iso}: {error}",
                    self.uid
                );
            }
        }
    }
}
