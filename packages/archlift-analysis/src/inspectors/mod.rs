//! Built-in class inspectors.

mod category;
mod coupling;

pub use category::ClassCategoryTagger;
pub use coupling::CouplingInspector;

use crate::inspector::Inspector;

/// Default inspector set for the class-analysis phase.
pub fn default_class_inspectors() -> Vec<Box<dyn Inspector>> {
    vec![
        Box::new(ClassCategoryTagger::new()),
        Box::new(CouplingInspector::new()),
    ]
}
