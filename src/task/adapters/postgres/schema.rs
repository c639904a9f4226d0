//! Diesel schema for scheduled task persistence.

diesel::table! {
    /// Scheduled prompts owned by a session.
    tasks (id) {
        /// Task identifier.
        id -> Uuid,
        /// Owning session.
        session_id -> Uuid,
        /// Display name.
        #[max_length = 200]
        name -> Varchar,
        /// Prompt sent on every run.
        prompt -> Text,
        /// Schedule kind: `none`, `once` or `recurring`.
        #[max_length = 20]
        schedule_type -> Varchar,
        /// One-shot firing instant.
        run_at -> Nullable<Timestamptz>,
        /// Five-field cron expression.
        #[max_length = 100]
        cron_expr -> Nullable<Varchar>,
        /// IANA timezone for the cron expression.
        #[max_length = 64]
        timezone -> Nullable<Varchar>,
        /// Scheduling state kind.
        #[max_length = 20]
        state -> Varchar,
        /// When the task was last enabled.
        enabled_at -> Nullable<Timestamptz>,
        /// Next firing instant while pending.
        next_run_at -> Nullable<Timestamptz>,
        /// When the current run was enqueued.
        dispatched_at -> Nullable<Timestamptz>,
        /// When a one-shot task was retired.
        completed_at -> Nullable<Timestamptz>,
        /// When the task last ran successfully.
        last_run_at -> Nullable<Timestamptz>,
        /// Successful run count.
        run_count -> Int4,
        /// Error of the most recent terminally failed run.
        last_error -> Nullable<Text>,
        /// Creation timestamp.
        created_at -> Timestamptz,
        /// Last update timestamp.
        updated_at -> Timestamptz,
    }
}
