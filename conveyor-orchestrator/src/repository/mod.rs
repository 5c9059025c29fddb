pub mod project;
pub mod publish;
pub mod setting;

pub use project::{PgProjectRepository, ProjectRepository};
pub use publish::{JobInsert, NewOperationLog, PgPublishRepository, PublishRepository};
pub use setting::{PgSettingRepository, SettingRepository};
