//! Tags every class node with its category (`java.class`, `java.interface`,
//! ...).

use crate::error::Result;
use crate::inspector::{InspectionContext, Inspector};
use archlift_graph::{keys, ClassType, GraphNode};

pub struct ClassCategoryTagger;

impl ClassCategoryTagger {
    pub fn new() -> Self {
        Self
    }

    fn tag_for(class_type: ClassType) -> &'static str {
        match class_type {
            ClassType::Class => "java.class",
            ClassType::Interface => "java.interface",
            ClassType::Enum => "java.enum",
            ClassType::Annotation => "java.annotation",
            ClassType::Record => "java.record",
        }
    }
}

impl Default for ClassCategoryTagger {
    fn default() -> Self {
        Self::new()
    }
}

impl Inspector for ClassCategoryTagger {
    fn id(&self) -> &'static str {
        "class-category-tagger"
    }

    fn run(&self, node: &GraphNode, ctx: &InspectionContext<'_>) -> Result<bool> {
        let Some(class_type) = node
            .property_str(keys::CLASS_TYPE)
            .and_then(|s| ClassType::parse(s).ok())
        else {
            return Ok(false);
        };
        let tag = Self::tag_for(class_type);
        if node.has_tag(tag) {
            return Ok(false);
        }
        ctx.enable_tag(tag)?;
        Ok(true)
    }
}
