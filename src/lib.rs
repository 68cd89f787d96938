pub mod application;
pub mod domain;
pub mod infrastructure;

pub use application::mirror::{MirrorService, ORDER_FIELD, ReconcileOutcome, SyncError};
pub use application::watcher::{NowProvider, RoutineWatcher, SeedReport, WatchSession};
pub use domain::calendar::{
    DEFAULT_ZONE, WINDOW_DAYS, add_days, projected_dates, to_iso_date, today_start, weekday_of,
    window_dates,
};
pub use domain::layout::{
    ColumnSlot, DEFAULT_RING_BANDS, LayoutError, RingBand, RingSlot, TieBreak, clusters,
    column_layout, fill_gaps, is_gap_id, ring_layout,
};
pub use domain::models::{
    DateEntry, DateSchedule, EntrySource, MINUTES_PER_DAY, TemplateEntry, TimeInterval, Weekday,
    WeekdayTemplate,
};
pub use infrastructure::document_store::{
    ChangeListener, Document, DocumentStore, FieldMap, SubscriptionHandle, WriteBatch, WriteOp,
};
pub use infrastructure::error::StoreError;
pub use infrastructure::memory_store::InMemoryDocumentStore;
pub use infrastructure::sqlite_store::SqliteDocumentStore;
