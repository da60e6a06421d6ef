//! Generator: optimized AST to TypeScript declarations.
//!
//! Output order is type aliases, then classes, then enums. Blocks are
//! separated by a blank line and the text ends with a newline. A
//! declaration banner prefixes every block; a class banner only classes.

pub mod declarations;
pub mod expression;

use std::collections::HashSet;

use crate::ast::Ast;
use crate::config::CompileOptions;

use self::declarations::{declare_classes, declare_enums, declare_types};
use self::expression::TypeRenderer;

/// Emit the declarations of one compiled schema.
///
/// One renderer is shared by the three passes, so a node renders to the same
/// text wherever it is used. The emitted-class registry lives only for this
/// call.
pub fn generate(ast: &Ast, root_name: &str, options: &CompileOptions) -> String {
    let mut renderer = TypeRenderer::new(ast, options);
    let mut emitted_classes: HashSet<String> = HashSet::new();

    let mut blocks = declare_types(ast, &mut renderer, root_name, options);
    blocks.extend(declare_classes(
        ast,
        &mut renderer,
        root_name,
        options,
        &mut emitted_classes,
    ));
    blocks.extend(declare_enums(ast, options));

    if blocks.is_empty() {
        return String::new();
    }
    if let Some(banner) = &options.declaration_banner {
        for block in &mut blocks {
            *block = format!("{banner}\n{block}");
        }
    }
    let mut output = blocks.join("\n\n");
    output.push('\n');

    tracing::debug!(
        declarations = blocks.len(),
        bytes = output.len(),
        "generate complete"
    );
    output
}
