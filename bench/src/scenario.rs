//! The five canonical OLTP scenarios, each built once per table with an
//! identical statement shape so the two measurements compare directly.

use bench_core::config::ScenarioIterations;
use bench_core::types::SchemaTag;
use chrono::{Days, NaiveDate};

use crate::dialect::INSERT_COLUMNS;
use crate::executor::SqlValue;

/// Inputs available to parameter generators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParamContext {
    /// Rows generated into each table.
    pub row_count: u64,
    pub today: NaiveDate,
}

impl ParamContext {
    pub fn new(row_count: u64, today: NaiveDate) -> Self {
        Self { row_count, today }
    }

    pub fn today(row_count: u64) -> Self {
        Self::new(row_count, chrono::Local::now().date_naive())
    }
}

pub type ParamGenerator = fn(&ParamContext) -> Vec<SqlValue>;

/// Static description of a scenario; `{table}` and `{columns}` are filled in
/// per schema tag.
pub struct ScenarioTemplate {
    pub name: &'static str,
    pub title: &'static str,
    pub statement: &'static str,
    pub params: ParamGenerator,
    pub iterations: fn(&ScenarioIterations) -> usize,
}

pub const TEMPLATES: [ScenarioTemplate; 5] = [
    ScenarioTemplate {
        name: "point_lookup",
        title: "Point lookup by id",
        statement: "SELECT * FROM {table} WHERE id = ?",
        params: |ctx| vec![SqlValue::Int((ctx.row_count / 2).max(1) as i64)],
        iterations: |it| it.point_lookup,
    },
    ScenarioTemplate {
        name: "filtered_lookup",
        title: "Lookup by customer_id and status",
        statement: "SELECT * FROM {table} WHERE customer_id = ? AND status = 'completed'",
        params: |_| vec![SqlValue::Int(1234)],
        iterations: |it| it.filtered_lookup,
    },
    ScenarioTemplate {
        name: "range_aggregation",
        title: "Date-range aggregation with GROUP BY",
        statement: "SELECT status, COUNT(*), SUM(total_amount)
                      FROM {table}
                     WHERE order_date BETWEEN ? AND ?
                     GROUP BY status",
        params: |ctx| {
            let from = ctx
                .today
                .checked_sub_days(Days::new(180))
                .unwrap_or(ctx.today);
            vec![SqlValue::Date(from), SqlValue::Date(ctx.today)]
        },
        iterations: |it| it.range_aggregation,
    },
    ScenarioTemplate {
        name: "insert",
        title: "Single-row INSERT",
        statement: "INSERT INTO {table} ({columns}) VALUES (?, CURRENT_DATE, 'pending', ?, ?, ?)",
        params: |_| {
            vec![
                SqlValue::Int(9999),
                SqlValue::Real(500.0),
                SqlValue::Int(50),
                SqlValue::Int(5),
            ]
        },
        iterations: |it| it.insert,
    },
    ScenarioTemplate {
        name: "conditional_update",
        title: "Conditional UPDATE",
        statement: "UPDATE {table} SET status = 'completed' WHERE customer_id = ? AND status = 'pending'",
        params: |_| vec![SqlValue::Int(9999)],
        iterations: |it| it.conditional_update,
    },
];

/// A scenario bound to one table. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct Scenario {
    pub name: &'static str,
    pub title: &'static str,
    pub tag: SchemaTag,
    pub statement: String,
    pub params: Vec<SqlValue>,
    pub iterations: usize,
}

impl ScenarioTemplate {
    pub fn bind(
        &self,
        tag: SchemaTag,
        iterations: &ScenarioIterations,
        ctx: &ParamContext,
    ) -> Scenario {
        Scenario {
            name: self.name,
            title: self.title,
            tag,
            statement: self
                .statement
                .replace("{table}", tag.table_name())
                .replace("{columns}", INSERT_COLUMNS),
            params: (self.params)(ctx),
            iterations: (self.iterations)(iterations),
        }
    }
}

/// Every scenario for one table, in catalog order.
pub fn catalog_for(
    tag: SchemaTag,
    iterations: &ScenarioIterations,
    ctx: &ParamContext,
) -> Vec<Scenario> {
    TEMPLATES
        .iter()
        .map(|template| template.bind(tag, iterations, ctx))
        .collect()
}

/// The full catalog: all baseline scenarios, then all candidate scenarios.
pub fn catalog(iterations: &ScenarioIterations, ctx: &ParamContext) -> Vec<Scenario> {
    SchemaTag::ALL
        .into_iter()
        .flat_map(|tag| catalog_for(tag, iterations, ctx))
        .collect()
}
