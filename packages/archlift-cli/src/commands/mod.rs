pub mod apply;
pub mod export;
pub mod history;
pub mod inventory;
pub mod plan_info;
