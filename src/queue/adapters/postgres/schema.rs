//! Diesel schema for job queue persistence.

diesel::table! {
    /// Durable queued work.
    jobs (id) {
        /// Job identifier.
        id -> Uuid,
        /// Raw job type routing key.
        #[max_length = 100]
        job_type -> Varchar,
        /// JSON payload for the job type.
        payload -> Jsonb,
        /// Globally unique idempotency key.
        #[max_length = 255]
        dedupe_key -> Varchar,
        /// Lifecycle status.
        #[max_length = 20]
        status -> Varchar,
        /// Attempts consumed.
        attempts -> Int4,
        /// Attempt budget.
        max_attempts -> Int4,
        /// Earliest execution instant.
        run_at -> Timestamptz,
        /// Worker holding the lease.
        #[max_length = 100]
        locked_by -> Nullable<Varchar>,
        /// Lease start.
        locked_at -> Nullable<Timestamptz>,
        /// Lease deadline.
        lease_expires_at -> Nullable<Timestamptz>,
        /// Most recent failure message.
        last_error -> Nullable<Text>,
        /// Creation timestamp.
        created_at -> Timestamptz,
        /// Last update timestamp.
        updated_at -> Timestamptz,
    }
}
