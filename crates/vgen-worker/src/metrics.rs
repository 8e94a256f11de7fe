//! Job lifecycle metrics.

use metrics::counter;

pub mod names {
    pub const JOBS_STARTED: &str = "vgen_jobs_started_total";
    pub const JOBS_COMPLETED: &str = "vgen_jobs_completed_total";
    pub const JOBS_FAILED: &str = "vgen_jobs_failed_total";
    pub const JOBS_REJECTED: &str = "vgen_jobs_rejected_total";
    pub const CREDIT_REFUNDS: &str = "vgen_credit_refunds_total";
}

pub fn record_job_started() {
    counter!(names::JOBS_STARTED).increment(1);
}

pub fn record_job_completed() {
    counter!(names::JOBS_COMPLETED).increment(1);
}

pub fn record_job_failed(kind: &'static str) {
    counter!(names::JOBS_FAILED, "kind" => kind).increment(1);
}

pub fn record_job_rejected(kind: &'static str) {
    counter!(names::JOBS_REJECTED, "kind" => kind).increment(1);
}

pub fn record_refund(outcome: &'static str) {
    counter!(names::CREDIT_REFUNDS, "outcome" => outcome).increment(1);
}
