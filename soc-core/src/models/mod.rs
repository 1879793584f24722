pub mod alert;
pub mod ecs;
pub mod event;
pub mod ioc;
pub mod job;
pub mod response;
pub mod rule;

pub use alert::{Alert, AlertSeverity, AlertStatus};
pub use ecs::EcsDocument;
pub use event::{EventKind, EventOutcome, ParsedEvent};
pub use ioc::{EnrichmentResult, EnrichmentStatus, IocMatch, IocType, Verdict};
pub use job::{JobPriority, JobStatus, ParsingJob};
pub use response::{AuditLog, ResponseAction, ResponseActionType, ResponseStatus};
pub use rule::{CorrelationConfig, DetectionRule, RuleExecution, RuleStatus, RuleType};
