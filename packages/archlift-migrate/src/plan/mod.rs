pub mod loader;
pub mod model;

pub use loader::{load_plan, parse_key_value, LoadedPlan, PlanLoadOptions};
pub use model::{
    Block, BlockSpec, FileOperationKind, GraphQueryKind, MigrationPlan, Phase, PlanFile, Task,
    ValidationType,
};
