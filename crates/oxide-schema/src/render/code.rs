//! Builder code generation.
//!
//! Renders operations as Rust expressions against this crate's fluent
//! builders, and whole migration units implementing [`Migration`].
//!
//! [`Migration`]: crate::migration::Migration

use crate::operation::{inverse, Operation};
use crate::schema::{ColumnSpec, DefaultValue, ForeignKeySpec, IndexSpec, ReferentialAction, TableSpec};
use crate::types::DEFAULT_DECIMAL_SCALE;

const OP_INDENT: &str = "            ";
const CHAIN_INDENT: &str = "                ";

/// Renders operations as a `vec![...]` of builder expressions.
///
/// # Example
///
/// ```rust
/// use oxide_schema::column_builder::string;
/// use oxide_schema::operation::Operation;
/// use oxide_schema::render::render_builder_code;
///
/// let code = render_builder_code(&[Operation::add_column(
///     "users",
///     string("nickname", 40).build(),
/// )]);
/// assert_eq!(
///     code,
///     "vec![\n    Operation::add_column(\"users\", string(\"nickname\", 40).build()),\n]"
/// );
/// ```
#[must_use]
pub fn render_builder_code(ops: &[Operation]) -> String {
    let mut out = String::from("vec![\n");
    for op in ops {
        out.push_str("    ");
        out.push_str(&render_operation(op, "        "));
        out.push_str(",\n");
    }
    out.push(']');
    out
}

/// Generates a Rust source string with a struct implementing
/// `Migration`, whose `down()` spells out the inverse of `ops`.
///
/// # Arguments
///
/// * `id` - The migration ID (e.g. `"0002_add_email"`).
/// * `ops` - The up operations, as produced by the differ.
#[must_use]
pub fn render_migration(id: &str, ops: &[Operation]) -> String {
    let struct_name = id_to_struct_name(id);
    let up_body = render_operations(ops);
    let down_body = render_operations(&inverse(ops));

    format!(
        "use oxide_schema::prelude::*;\n\
         \n\
         pub struct {struct_name};\n\
         \n\
         impl Migration for {struct_name} {{\n\
         \x20   const ID: &'static str = \"{id}\";\n\
         \n\
         \x20   fn up() -> Vec<Operation> {{\n\
         \x20       vec![\n\
         {up_body}\
         \x20       ]\n\
         \x20   }}\n\
         \n\
         \x20   fn down() -> Vec<Operation> {{\n\
         \x20       vec![\n\
         {down_body}\
         \x20       ]\n\
         \x20   }}\n\
         }}\n",
        id = escape_str(id)
    )
}

// ================================================================
// Internal helpers
// ================================================================

/// Converts a migration ID like "0002_add_email" into a struct
/// name like "Migration0002AddEmail".
fn id_to_struct_name(id: &str) -> String {
    let mut result = String::from("Migration");
    let mut capitalize_next = true;
    for ch in id.chars() {
        if !ch.is_ascii_alphanumeric() {
            capitalize_next = true;
        } else if capitalize_next {
            result.push(ch.to_ascii_uppercase());
            capitalize_next = false;
        } else {
            result.push(ch);
        }
    }
    result
}

fn render_operations(ops: &[Operation]) -> String {
    let mut out = String::new();
    for op in ops {
        out.push_str(OP_INDENT);
        out.push_str(&render_operation(op, CHAIN_INDENT));
        out.push_str(",\n");
    }
    out
}

/// Renders one operation; `pad` indents continuation lines of table
/// builder chains.
fn render_operation(op: &Operation, pad: &str) -> String {
    match op {
        Operation::CreateTable(table) => format!("{}\n{pad}.into()", render_table(table, pad)),
        Operation::DropTable(table) => {
            format!("Operation::drop_table({})", render_table(table, pad))
        }
        Operation::AddColumn { table, column } => format!(
            "Operation::add_column(\"{}\", {})",
            escape_str(table),
            render_column(column)
        ),
        Operation::DropColumn { table, column } => format!(
            "Operation::drop_column(\"{}\", {})",
            escape_str(table),
            render_column(column)
        ),
        Operation::ModifyColumn { table, old, new } => format!(
            "Operation::modify_column(\"{}\", {}, {})",
            escape_str(table),
            render_column(old),
            render_column(new)
        ),
        Operation::AddIndex { table, index } => format!(
            "Operation::add_index(\"{}\", {})",
            escape_str(table),
            render_index(index)
        ),
        Operation::DropIndex { table, index } => format!(
            "Operation::drop_index(\"{}\", {})",
            escape_str(table),
            render_index(index)
        ),
        Operation::AddForeignKey { table, foreign_key } => format!(
            "Operation::add_foreign_key(\"{}\", {})",
            escape_str(table),
            render_foreign_key(foreign_key)
        ),
        Operation::DropForeignKey { table, foreign_key } => format!(
            "Operation::drop_foreign_key(\"{}\", {})",
            escape_str(table),
            render_foreign_key(foreign_key)
        ),
        Operation::RecreateTable { old, new } => format!(
            "Operation::RecreateTable {{\n{pad}old: {},\n{pad}new: {},\n{pad}}}",
            render_table(old, pad),
            render_table(new, pad)
        ),
    }
}

/// Renders a `TableBuilder` chain ending in `.build()`.
fn render_table(table: &TableSpec, pad: &str) -> String {
    if table.columns.is_empty() {
        return format!("TableSpec::new(\"{}\")", escape_str(&table.name));
    }
    let mut s = String::from("TableBuilder::new()\n");
    s.push_str(&format!("{pad}.name(\"{}\")\n", escape_str(&table.name)));
    for column in &table.columns {
        s.push_str(&format!("{pad}.column({})\n", render_column(column)));
    }
    for index in &table.indexes {
        s.push_str(&format!("{pad}.index_spec({})\n", render_index(index)));
    }
    for fk in &table.foreign_keys {
        s.push_str(&format!("{pad}.foreign_key({})\n", render_foreign_key(fk)));
    }
    s.push_str(&format!("{pad}.build()"));
    s
}

/// Renders a column builder expression.
fn render_column(column: &ColumnSpec) -> String {
    let name = escape_str(&column.name);
    let mut chain = match (column.type_name.as_str(), column.length, column.precision, column.scale) {
        (ty @ ("integer" | "float" | "boolean" | "text" | "json" | "uuid"), _, _, _) => {
            format!("{ty}(\"{name}\")")
        }
        ("string", Some(length), _, _) => format!("string(\"{name}\", {length})"),
        // A declared precision without a scale means scale 0.
        ("decimal", _, Some(p), scale) => format!(
            "decimal(\"{name}\", {p}, {})",
            scale.unwrap_or(DEFAULT_DECIMAL_SCALE)
        ),
        (ty, length, precision, scale) => {
            let mut chain = format!("column(\"{name}\", \"{}\")", escape_str(ty));
            if let Some(length) = length {
                chain.push_str(&format!(".length({length})"));
            }
            if let Some(p) = precision {
                let s = scale.unwrap_or(DEFAULT_DECIMAL_SCALE);
                chain.push_str(&format!(".precision({p}, {s})"));
            }
            chain
        }
    };

    if column.primary_key {
        chain.push_str(".primary_key()");
    } else if !column.nullable {
        chain.push_str(".not_null()");
    }
    if column.unique {
        chain.push_str(".unique()");
    }
    match &column.default {
        Some(DefaultValue::Literal(value)) => {
            chain.push_str(&format!(".default_literal(\"{}\")", escape_str(value)));
        }
        Some(DefaultValue::Expression(expr)) => {
            chain.push_str(&format!(".default_expr(\"{}\")", escape_str(expr)));
        }
        None => {}
    }
    chain.push_str(".build()");
    chain
}

fn render_index(index: &IndexSpec) -> String {
    format!(
        "IndexSpec::named(\"{}\", &[{}], {})",
        escape_str(&index.name),
        render_names(&index.columns),
        index.unique
    )
}

fn render_foreign_key(fk: &ForeignKeySpec) -> String {
    let mut s = format!(
        "ForeignKeySpec::named(\"{}\", &[{}], \"{}\", &[{}])",
        escape_str(&fk.name),
        render_names(&fk.columns),
        escape_str(&fk.referenced_table),
        render_names(&fk.referenced_columns)
    );
    if fk.on_delete != ReferentialAction::NoAction {
        s.push_str(&format!(".on_delete({})", render_action(fk.on_delete)));
    }
    if fk.on_update != ReferentialAction::NoAction {
        s.push_str(&format!(".on_update({})", render_action(fk.on_update)));
    }
    s
}

const fn render_action(action: ReferentialAction) -> &'static str {
    match action {
        ReferentialAction::NoAction => "ReferentialAction::NoAction",
        ReferentialAction::Restrict => "ReferentialAction::Restrict",
        ReferentialAction::Cascade => "ReferentialAction::Cascade",
        ReferentialAction::SetNull => "ReferentialAction::SetNull",
        ReferentialAction::SetDefault => "ReferentialAction::SetDefault",
    }
}

fn render_names(names: &[String]) -> String {
    names
        .iter()
        .map(|n| format!("\"{}\"", escape_str(n)))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Escapes a string for inclusion in a Rust string literal.
fn escape_str(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}
