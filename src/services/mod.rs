pub mod cancel;
pub mod dispatch_service;
pub mod identity_service;
pub mod job_service;
pub mod quota_service;
pub mod scheduler;
