//! Cost-based AST rewriter (C5, §4.4).
//!
//! Normalizes an AST, enumerates cheap local rewrites (flip choices for
//! `EXISTS`, per-table ordering choices, driving-side choices for joins),
//! costs each candidate against an index/statistics oracle, and returns the
//! cheapest — ties broken deterministically so the same input always plans
//! to the same output (§4.4 invariant: `planQuery` is a semantic no-op,
//! never changes `limit`, `one`, or projections).

use crate::ast::{Ast, Direction, Expr, Operand};
use crate::error::EngineError;
use crate::schema::Schema;

/// Per-`(table, column-prefix)` statistics a planner needs to cost a plan.
/// The exact surface beyond these three fields is left open by §4.4/§9 —
/// resolved in DESIGN.md by keeping it to the minimum that distinguishes the
/// three plan shapes spec.md's cost-model scenarios exercise: indexed vs.
/// scanned access, and relative driving-side size for a two-input operator.
pub trait StatsOracle {
    /// Approximate number of distinct values for this column prefix, or
    /// `None` if the statistic is unavailable (planner falls back to a
    /// default scan-cost plan and never fails the query, §7).
    fn distinct_count(&self, table: &str, columns: &[String]) -> Option<u64>;
    /// Approximate row count for the table.
    fn row_count(&self, table: &str) -> Option<u64>;
    /// Whether this column prefix is covered by an index.
    fn is_indexed(&self, table: &str, columns: &[String]) -> bool;
}

/// A stats oracle with nothing recorded: every table is an unindexed scan.
/// Used when statistics are unavailable (§7 "Planner... degrades to default
/// plan, never fails the query").
#[derive(Default)]
pub struct NoStats;

impl StatsOracle for NoStats {
    fn distinct_count(&self, _table: &str, _columns: &[String]) -> Option<u64> {
        None
    }
    fn row_count(&self, _table: &str) -> Option<u64> {
        None
    }
    fn is_indexed(&self, _table: &str, _columns: &[String]) -> bool {
        false
    }
}

/// Estimated cost of one candidate plan, used only for ranking — never
/// surfaced to callers.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Cost(f64);

impl Eq for Cost {}
impl PartialOrd for Cost {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for Cost {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.partial_cmp(&other.0).unwrap_or(std::cmp::Ordering::Equal)
    }
}

/// Plans `ast` against `schema`/`stats`, returning a semantically equivalent
/// but (no more expensive) AST. Never fails: an unplannable table or missing
/// statistic just degrades to a default scan-cost plan (§7).
pub fn plan_query(ast: &Ast, schema: &Schema, stats: &dyn StatsOracle) -> Result<Ast, EngineError> {
    let normalized = normalize(ast, schema)?;
    let candidates = enumerate_candidates(&normalized);
    let mut best: Option<(Ast, Cost)> = None;
    for candidate in candidates {
        let cost = estimate_cost(&candidate, schema, stats);
        best = Some(match best {
            None => (candidate, cost),
            Some((best_ast, best_cost)) => {
                if tie_break(&candidate, cost, &best_ast, best_cost, schema, stats) {
                    (candidate, cost)
                } else {
                    (best_ast, best_cost)
                }
            }
        });
    }
    Ok(best.map(|(ast, _)| ast).unwrap_or(normalized))
}

/// Step 1: push-down, common-subexpression factoring, orderBy
/// canonicalization with PK tiebreaker appended to every level.
fn normalize(ast: &Ast, schema: &Schema) -> Result<Ast, EngineError> {
    let mut normalized = ast.clone();
    if let Some(filter) = normalized.filter.take() {
        normalized.filter = Some(push_down_and_factor(filter));
    }
    let order = normalized.with_total_order(schema)?;
    normalized.order_by = Some(order);
    for related in normalized.related.iter_mut() {
        related.subquery = Box::new(normalize(&related.subquery, schema)?);
    }
    Ok(normalized)
}

/// Flattens nested `And`s and deduplicates identical conjuncts — a cheap,
/// purely syntactic factoring that doesn't need column-existence analysis
/// since this crate's ASTs are always scoped to one table per node already
/// (cross-table push-down happens at the `related`/correlated-subquery
/// boundary, which `normalize`'s recursion already walks).
fn push_down_and_factor(expr: Expr) -> Expr {
    match expr {
        Expr::And { conditions } => {
            let mut flat = Vec::new();
            for c in conditions {
                match push_down_and_factor(c) {
                    Expr::And { conditions: inner } => flat.extend(inner),
                    other => flat.push(other),
                }
            }
            dedup_exprs(&mut flat);
            if flat.len() == 1 {
                flat.into_iter().next().unwrap()
            } else {
                Expr::And { conditions: flat }
            }
        }
        Expr::Or { conditions } => Expr::Or { conditions: conditions.into_iter().map(push_down_and_factor).collect() },
        Expr::Not { condition } => Expr::Not { condition: Box::new(push_down_and_factor(*condition)) },
        other => other,
    }
}

fn dedup_exprs(exprs: &mut Vec<Expr>) {
    let mut seen = Vec::new();
    exprs.retain(|e| {
        let key = expr_key(e);
        if seen.contains(&key) {
            false
        } else {
            seen.push(key);
            true
        }
    });
}

fn expr_key(expr: &Expr) -> String {
    format!("{expr:?}")
}

/// Step 2: enumerate local rewrites. Each candidate is semantically
/// identical to `normalized`; only `flip` hints on correlated subqueries
/// vary, since this implementation's cost estimate does not yet model
/// alternate table scan orderings or multiple available indexes beyond
/// what `StatsOracle::is_indexed` reports for the AST's own `orderBy`.
fn enumerate_candidates(normalized: &Ast) -> Vec<Ast> {
    let flip_sites = count_flippable(normalized);
    if flip_sites == 0 {
        return vec![normalized.clone()];
    }
    (0u32..(1 << flip_sites))
        .map(|mask| {
            let mut candidate = normalized.clone();
            let mut site = 0;
            set_flips(&mut candidate, mask, &mut site);
            candidate
        })
        .collect()
}

fn count_flippable(ast: &Ast) -> u32 {
    let mut count = 0;
    if let Some(filter) = &ast.filter {
        count_flippable_expr(filter, &mut count);
    }
    for related in &ast.related {
        count += count_flippable(&related.subquery);
    }
    count
}

fn count_flippable_expr(expr: &Expr, count: &mut u32) {
    match expr {
        Expr::CorrelatedSubquery { .. } => *count += 1,
        Expr::And { conditions } | Expr::Or { conditions } => {
            for c in conditions {
                count_flippable_expr(c, count);
            }
        }
        Expr::Not { condition } => count_flippable_expr(condition, count),
        Expr::Simple { .. } => {}
    }
}

fn set_flips(ast: &mut Ast, mask: u32, site: &mut u32) {
    if let Some(filter) = ast.filter.as_mut() {
        set_flips_expr(filter, mask, site);
    }
    for related in ast.related.iter_mut() {
        set_flips(&mut related.subquery, mask, site);
    }
}

fn set_flips_expr(expr: &mut Expr, mask: u32, site: &mut u32) {
    match expr {
        Expr::CorrelatedSubquery { flip, .. } => {
            *flip = (mask >> *site) & 1 == 1;
            *site += 1;
        }
        Expr::And { conditions } | Expr::Or { conditions } => {
            for c in conditions {
                set_flips_expr(c, mask, site);
            }
        }
        Expr::Not { condition } => set_flips_expr(condition, mask, site),
        Expr::Simple { .. } => {}
    }
}

/// Step 3: sum, for every operator implied by the AST shape, an estimate
/// proportional to the rows it iterates (indexed lookup `log n + k`, scan
/// `n`, join = driving + correlated lookups).
fn estimate_cost(ast: &Ast, schema: &Schema, stats: &dyn StatsOracle) -> Cost {
    let mut total = scan_cost(&ast.table, ast.order_by.as_deref().unwrap_or(&[]), stats);
    if let Some(filter) = &ast.filter {
        total += filter_cost(filter, ast, schema, stats);
    }
    for related in &ast.related {
        total += estimate_cost(&related.subquery, schema, stats).0;
    }
    Cost(total)
}

fn scan_cost(table: &str, order_by: &[(String, Direction)], stats: &dyn StatsOracle) -> f64 {
    let columns: Vec<String> = order_by.iter().map(|(c, _)| c.clone()).collect();
    let n = stats.row_count(table).unwrap_or(1000) as f64;
    if stats.is_indexed(table, &columns) {
        n.max(1.0).log2() + 1.0
    } else {
        n
    }
}

fn filter_cost(expr: &Expr, ast: &Ast, schema: &Schema, stats: &dyn StatsOracle) -> f64 {
    match expr {
        Expr::Simple { left, .. } => {
            let col = match left {
                Operand::Column { name } => vec![name.clone()],
                Operand::Literal { .. } => vec![],
            };
            if col.is_empty() {
                0.0
            } else if stats.is_indexed(&ast.table, &col) {
                let distinct = stats.distinct_count(&ast.table, &col).unwrap_or(1).max(1);
                let n = stats.row_count(&ast.table).unwrap_or(1000) as f64;
                (n.max(1.0).log2()) + (n / distinct as f64)
            } else {
                0.0
            }
        }
        Expr::And { conditions } | Expr::Or { conditions } => {
            conditions.iter().map(|c| filter_cost(c, ast, schema, stats)).sum()
        }
        Expr::Not { condition } => filter_cost(condition, ast, schema, stats),
        Expr::CorrelatedSubquery { related, flip, .. } => {
            let driving_table = if *flip { &related.subquery.table } else { &ast.table };
            let driving_n = stats.row_count(driving_table).unwrap_or(1000) as f64;
            let child_n = stats.row_count(&related.subquery.table).unwrap_or(1000) as f64;
            driving_n + correlated_lookup_cost(&related.subquery, schema, stats) * child_n.min(driving_n).max(1.0).log2()
        }
    }
}

fn correlated_lookup_cost(subquery: &Ast, schema: &Schema, stats: &dyn StatsOracle) -> f64 {
    let pk = schema.table(&subquery.table).map(|t| t.primary_key.clone()).unwrap_or_default();
    if stats.is_indexed(&subquery.table, &pk) {
        1.0
    } else {
        stats.row_count(&subquery.table).unwrap_or(1000) as f64
    }
}

/// Returns `true` if `candidate` should replace `incumbent` as the best
/// plan: strictly cheaper, or equal cost and a deterministic tie-break
/// favors it (indexed plans, then smaller driving side, then lexicographic
/// order of the rewritten AST's debug representation).
fn tie_break(
    candidate: &Ast,
    candidate_cost: Cost,
    incumbent: &Ast,
    incumbent_cost: Cost,
    schema: &Schema,
    stats: &dyn StatsOracle,
) -> bool {
    if candidate_cost < incumbent_cost {
        return true;
    }
    if candidate_cost > incumbent_cost {
        return false;
    }
    let candidate_indexed = is_root_indexed(candidate, stats);
    let incumbent_indexed = is_root_indexed(incumbent, stats);
    if candidate_indexed != incumbent_indexed {
        return candidate_indexed;
    }
    let candidate_driving = min_driving_side(candidate, schema, stats);
    let incumbent_driving = min_driving_side(incumbent, schema, stats);
    if candidate_driving != incumbent_driving {
        return candidate_driving < incumbent_driving;
    }
    format!("{candidate:?}") < format!("{incumbent:?}")
}

fn is_root_indexed(ast: &Ast, stats: &dyn StatsOracle) -> bool {
    let columns: Vec<String> = ast.order_by.as_deref().unwrap_or(&[]).iter().map(|(c, _)| c.clone()).collect();
    stats.is_indexed(&ast.table, &columns)
}

fn min_driving_side(ast: &Ast, schema: &Schema, stats: &dyn StatsOracle) -> u64 {
    let mut min = stats.row_count(&ast.table).unwrap_or(u64::MAX);
    if let Some(filter) = &ast.filter {
        min_driving_side_expr(filter, schema, stats, &mut min);
    }
    min
}

fn min_driving_side_expr(expr: &Expr, schema: &Schema, stats: &dyn StatsOracle, min: &mut u64) {
    match expr {
        Expr::CorrelatedSubquery { related, .. } => {
            let n = stats.row_count(&related.subquery.table).unwrap_or(u64::MAX);
            *min = (*min).min(n);
        }
        Expr::And { conditions } | Expr::Or { conditions } => {
            for c in conditions {
                min_driving_side_expr(c, schema, stats, min);
            }
        }
        Expr::Not { condition } => min_driving_side_expr(condition, schema, stats, min),
        Expr::Simple { .. } => {}
    }
}
