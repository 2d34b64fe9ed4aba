//! Shared fixture schema for engine and reconciliation tests: a small
//! forum domain with a two-hop chain, a conditional rule, a delta column,
//! a polymorphic owner pair, and a self-referential relation.

pub mod store;

use crate::{
    model::{
        chain::{KeyPair, RelationChain, RelationHop},
        predicate::Predicate,
        rule::{CounterRule, TouchSpec},
        table::{EntityDef, SoftDeleteSpec},
    },
    row::RowSnapshot,
    value::NumericKind,
};
use std::collections::BTreeMap;
use store::MemStore;

pub fn category_def() -> EntityDef {
    EntityDef::new("Category", "categories")
}

pub fn post_def() -> EntityDef {
    EntityDef::new("Post", "posts")
}

pub fn comment_def() -> EntityDef {
    EntityDef::new("Comment", "comments").with_soft_delete(SoftDeleteSpec::Timestamp {
        column: "deleted_at".to_string(),
    })
}

pub fn employee_def() -> EntityDef {
    EntityDef::new("Employee", "employees")
}

/// comment → post → category.
pub fn comment_category_chain() -> RelationChain {
    RelationChain::new(vec![
        RelationHop::to_one("post", vec![KeyPair::new("post_id", "id")], post_def()),
        RelationHop::to_one(
            "category",
            vec![KeyPair::new("category_id", "id")],
            category_def(),
        ),
    ])
}

/// Category.comments_count over the two-hop chain.
pub fn comments_count_rule() -> CounterRule {
    CounterRule::builder(comment_def(), comment_category_chain())
        .column("comments_count")
        .build()
        .unwrap()
}

/// Category.active_comments_count, conditional on live status.
pub fn active_comments_rule() -> CounterRule {
    CounterRule::builder(comment_def(), comment_category_chain())
        .conditional_columns(vec![(
            Predicate::eq("status", "live"),
            "active_comments_count".to_string(),
        )])
        .build()
        .unwrap()
}

/// Category.total_score, summing the comment score column.
pub fn total_score_rule() -> CounterRule {
    CounterRule::builder(comment_def(), comment_category_chain())
        .column("total_score")
        .delta_column("score", NumericKind::Integer)
        .build()
        .unwrap()
}

/// Same as [`comments_count_rule`] but stamping `updated_at`.
pub fn touching_comments_rule() -> CounterRule {
    CounterRule::builder(comment_def(), comment_category_chain())
        .column("comments_count")
        .touch(TouchSpec::updated_at())
        .build()
        .unwrap()
}

/// subscription → {User, Org} via subscriber_type.
pub fn subscription_chain() -> RelationChain {
    let mut owners = BTreeMap::new();
    owners.insert("User".to_string(), EntityDef::new("User", "users"));
    owners.insert("Org".to_string(), EntityDef::new("Org", "orgs"));
    RelationChain::new(vec![RelationHop::polymorphic(
        "subscriber",
        vec![KeyPair::new("subscriber_id", "id")],
        "subscriber_type",
        owners,
    )])
}

pub fn subscriptions_rule() -> CounterRule {
    CounterRule::builder(EntityDef::new("Subscription", "subscriptions"), subscription_chain())
        .column("subscriptions_count")
        .build()
        .unwrap()
}

pub fn project_def() -> EntityDef {
    EntityDef::new("Project", "projects").with_primary_key(&["tenant_id", "id"])
}

/// task → project on a tenant-scoped two-column key.
pub fn project_tasks_rule() -> CounterRule {
    CounterRule::builder(
        EntityDef::new("Task", "tasks"),
        RelationChain::new(vec![RelationHop::to_one(
            "project",
            vec![
                KeyPair::new("tenant_id", "tenant_id"),
                KeyPair::new("project_id", "id"),
            ],
            project_def(),
        )]),
    )
    .column("tasks_count")
    .build()
    .unwrap()
}

pub fn project_row(tenant_id: i64, id: i64) -> RowSnapshot {
    RowSnapshot::default()
        .with("tenant_id", tenant_id)
        .with("id", id)
        .with("tasks_count", 0)
}

pub fn task_row(id: i64, tenant_id: i64, project_id: i64) -> RowSnapshot {
    RowSnapshot::default()
        .with("id", id)
        .with("tenant_id", tenant_id)
        .with("project_id", project_id)
}

/// employee → manager (same table).
pub fn reports_rule() -> CounterRule {
    CounterRule::builder(
        employee_def(),
        RelationChain::new(vec![RelationHop::to_one(
            "manager",
            vec![KeyPair::new("manager_id", "id")],
            employee_def(),
        )]),
    )
    .column("reports_count")
    .build()
    .unwrap()
}

pub fn category_row(id: i64) -> RowSnapshot {
    RowSnapshot::default()
        .with("id", id)
        .with("comments_count", 0)
        .with("active_comments_count", 0)
        .with("total_score", 0)
}

pub fn post_row(id: i64, category_id: i64) -> RowSnapshot {
    RowSnapshot::default().with("id", id).with("category_id", category_id)
}

pub fn comment_row(id: i64, post_id: i64, status: &str, score: i64) -> RowSnapshot {
    RowSnapshot::default()
        .with("id", id)
        .with("post_id", post_id)
        .with("status", status)
        .with("score", score)
}

/// One category, one post, no comments.
pub fn seeded_store() -> MemStore {
    let store = MemStore::new();
    store.insert("categories", category_row(1));
    store.insert("posts", post_row(10, 1));
    store
}
