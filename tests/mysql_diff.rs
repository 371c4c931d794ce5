//! Integration tests for MySQL and SingleStore diffs.

use pretty_assertions::assert_eq;
use tidemark::migrate::{DiffResult, HintResolver, SchemaDiffer};
use tidemark::schema::ddl::{
    Column, DdlSnapshot, ForeignKey, Index, IndexColumn, PrimaryKey, ReferentialAction, Table,
    UniqueConstraint,
};
use tidemark::schema::Dialect;

fn snapshot(dialect: Dialect, tables: Vec<Table>) -> DdlSnapshot {
    let mut snapshot = DdlSnapshot::new(dialect);
    snapshot.tables = tables;
    snapshot
}

fn diff(before: &DdlSnapshot, after: &DdlSnapshot, hints: &[&str]) -> DiffResult {
    let resolver = HintResolver::parse(hints.iter().copied()).expect("valid hints");
    SchemaDiffer::new(before, after)
        .with_resolver(&resolver)
        .diff()
        .expect("diff should succeed")
}

fn users() -> Table {
    let mut id = Column::new("id", "int").not_null();
    id.autoincrement = true;
    let mut table = Table::new("", "users")
        .column(id)
        .column(Column::new("name", "text"));
    table.primary_key = Some(PrimaryKey::new("users_id", ["id"]));
    table
}

fn posts() -> Table {
    let mut table = Table::new("", "posts")
        .column(Column::new("id", "int").not_null())
        .column(Column::new("author_id", "int"));
    table.foreign_keys.push(ForeignKey {
        name: "posts_author_fk".into(),
        name_explicit: false,
        columns: vec!["author_id".into()],
        schema_to: "".into(),
        table_to: "users".into(),
        columns_to: vec!["id".into()],
        on_update: ReferentialAction::NoAction,
        on_delete: ReferentialAction::Cascade,
    });
    table
}

// ==================== Table Tests ====================

#[test]
fn test_create_tables_then_foreign_keys() {
    let before = DdlSnapshot::new(Dialect::Mysql);
    let after = snapshot(Dialect::Mysql, vec![posts(), users()]);

    assert_eq!(
        diff(&before, &after, &[]).sql_statements,
        vec![
            "CREATE TABLE `users` (\n\t`id` int PRIMARY KEY AUTO_INCREMENT NOT NULL,\n\t`name` text\n);\n",
            "CREATE TABLE `posts` (\n\t`id` int NOT NULL,\n\t`author_id` int\n);\n",
            "ALTER TABLE `posts` ADD CONSTRAINT `posts_author_fk` FOREIGN KEY (`author_id`) REFERENCES `users`(`id`) ON DELETE cascade ON UPDATE no action;",
        ]
    );
}

#[test]
fn test_rename_table_with_hint() {
    let before = snapshot(Dialect::Mysql, vec![users()]);
    let mut accounts = users();
    accounts.name = "accounts".into();
    let after = snapshot(Dialect::Mysql, vec![accounts]);

    assert_eq!(
        diff(&before, &after, &["users->accounts"]).sql_statements,
        vec!["RENAME TABLE `users` TO `accounts`;"]
    );
}

#[test]
fn test_drop_foreign_key_before_table() {
    let before = snapshot(Dialect::Mysql, vec![users(), posts()]);
    let mut detached = posts();
    detached.foreign_keys.clear();
    let after = snapshot(Dialect::Mysql, vec![detached]);

    assert_eq!(
        diff(&before, &after, &[]).sql_statements,
        vec![
            "ALTER TABLE `posts` DROP FOREIGN KEY `posts_author_fk`;",
            "DROP TABLE `users`;",
        ]
    );
}

// ==================== Column Tests ====================

#[test]
fn test_column_changes_fold_into_modify() {
    let before = snapshot(Dialect::Mysql, vec![users()]);
    let mut changed = users();
    changed.columns[1] = Column::new("name", "varchar(64)")
        .not_null()
        .with_default("'x'");
    let after = snapshot(Dialect::Mysql, vec![changed]);

    assert_eq!(
        diff(&before, &after, &[]).sql_statements,
        vec!["ALTER TABLE `users` MODIFY COLUMN `name` varchar(64) DEFAULT 'x' NOT NULL;"]
    );
}

#[test]
fn test_column_rename_with_hint() {
    let before = snapshot(Dialect::Mysql, vec![users()]);
    let mut renamed = users();
    renamed.columns[1].name = "full_name".into();
    let after = snapshot(Dialect::Mysql, vec![renamed]);

    assert_eq!(
        diff(&before, &after, &["users.name->users.full_name"]).sql_statements,
        vec!["ALTER TABLE `users` RENAME COLUMN `name` TO `full_name`;"]
    );
}

// ==================== Index & Constraint Tests ====================

#[test]
fn test_equivalent_index_is_renamed() {
    let index = |name: &str| Index::new(name, vec![IndexColumn::column("name")]);
    let mut from = users();
    from.indexes.push(index("by_name"));
    let mut to = users();
    to.indexes.push(index("name_idx"));
    let before = snapshot(Dialect::Mysql, vec![from]);
    let after = snapshot(Dialect::Mysql, vec![to]);

    assert_eq!(
        diff(&before, &after, &["users.by_name->users.name_idx"]).sql_statements,
        vec!["ALTER TABLE `users` RENAME INDEX `by_name` TO `name_idx`;"]
    );
    assert_eq!(
        diff(&before, &after, &[]).sql_statements,
        vec![
            "DROP INDEX `by_name` ON `users`;",
            "CREATE INDEX `name_idx` ON `users` (`name`);",
        ]
    );
}

#[test]
fn test_index_names_are_per_table() {
    let table = |name: &str, indexed: bool| {
        let mut table = Table::new("", name).column(Column::new("created_at", "timestamp"));
        if indexed {
            table.indexes.push(Index::new(
                "idx_created_at",
                vec![IndexColumn::column("created_at")],
            ));
        }
        table
    };
    let before = snapshot(Dialect::Mysql, vec![table("a", true), table("b", false)]);
    let after = snapshot(Dialect::Mysql, vec![table("a", true), table("b", true)]);

    assert!(diff(&after, &after, &[]).is_empty());
    assert_eq!(
        diff(&before, &after, &[]).sql_statements,
        vec!["CREATE INDEX `idx_created_at` ON `b` (`created_at`);"]
    );
}

#[test]
fn test_unique_added_and_dropped() {
    let before = snapshot(Dialect::Mysql, vec![users()]);
    let mut unique = users();
    unique
        .uniques
        .push(UniqueConstraint::new("users_name_unique", ["name"]));
    let after = snapshot(Dialect::Mysql, vec![unique]);

    assert_eq!(
        diff(&before, &after, &[]).sql_statements,
        vec!["ALTER TABLE `users` ADD CONSTRAINT `users_name_unique` UNIQUE(`name`);"]
    );
    assert_eq!(
        diff(&after, &before, &[]).sql_statements,
        vec!["DROP INDEX `users_name_unique` ON `users`;"]
    );
}

// ==================== SingleStore Tests ====================

#[test]
fn test_singlestore_unique_change_rebuilds_table() {
    let from = Table::new("", "users").column(Column::new("email", "text"));
    let mut to = from.clone();
    to.uniques
        .push(UniqueConstraint::new("users_email_unique", ["email"]));
    let before = snapshot(Dialect::Singlestore, vec![from]);
    let after = snapshot(Dialect::Singlestore, vec![to]);

    let result = diff(&before, &after, &[]);
    assert_eq!(result.statements.len(), 1);
    assert_eq!(
        result.sql_statements,
        vec![
            "CREATE TABLE `__new_users` (\n\t`email` text,\n\tCONSTRAINT `users_email_unique` UNIQUE(`email`)\n);\n",
            "INSERT INTO `__new_users`(`email`) SELECT `email` FROM `users`;",
            "DROP TABLE `users`;",
            "ALTER TABLE `__new_users` RENAME TO `users`;",
        ]
    );
}

#[test]
fn test_singlestore_default_change_modifies_in_place() {
    let from = Table::new("", "users").column(Column::new("role", "text"));
    let to = Table::new("", "users").column(Column::new("role", "text").with_default("'user'"));
    let before = snapshot(Dialect::Singlestore, vec![from]);
    let after = snapshot(Dialect::Singlestore, vec![to]);

    assert_eq!(
        diff(&before, &after, &[]).sql_statements,
        vec!["ALTER TABLE `users` MODIFY COLUMN `role` text DEFAULT 'user';"]
    );
}
