//! End-to-end table operations against an in-memory SQLite database.

use chrono::{NaiveDate, NaiveDateTime};
use liteorm::{
    ColumnInfo, ColumnType, Condition, Database, DbConfig, Entity, Executor, FromRecord, OrmError,
    OrmResult, Order, Record, Schema, Select, Value,
};

#[derive(Debug, PartialEq)]
struct Person {
    id: i64,
    name: Option<String>,
    active: bool,
    born: Option<NaiveDateTime>,
    salary: Option<f64>,
}

impl Entity for Person {
    fn schema() -> OrmResult<Schema> {
        Schema::builder("Person")
            .primary("id", ColumnType::Integer)
            .column("name", ColumnInfo::sized(ColumnType::NVarChar, 50))
            .column("active", ColumnInfo::new(ColumnType::Boolean))
            .column("born", ColumnInfo::new(ColumnType::DateTime))
            .column("salary", ColumnInfo::new(ColumnType::Money))
            .transient("display_name")
            .build()
    }
}

impl FromRecord for Person {
    fn from_record(r: &Record) -> OrmResult<Self> {
        Ok(Self {
            id: r.try_get("id")?,
            name: r.try_get("name")?,
            active: r.try_get("active")?,
            born: r.try_get("born")?,
            salary: r.try_get("salary")?,
        })
    }
}

fn at(y: i32, m: u32, d: u32, h: u32, mi: u32, s: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(y, m, d)
        .unwrap()
        .and_hms_opt(h, mi, s)
        .unwrap()
}

async fn setup() -> Database {
    let db = Database::init(DbConfig::in_memory(), [Person::schema().unwrap()])
        .await
        .unwrap();
    let people = db.table("Person").unwrap();
    people
        .insert_many(
            &db,
            [
                Record::new()
                    .with("id", 1)
                    .with("name", "Ada")
                    .with("active", true)
                    .with("born", at(1815, 12, 10, 0, 0, 0))
                    .with("salary", 100.5),
                Record::new()
                    .with("id", 2)
                    .with("name", "Bob")
                    .with("active", false),
                Record::new()
                    .with("id", 3)
                    .with("name", "O'Connor")
                    .with("active", true),
            ],
        )
        .await
        .unwrap();
    db
}

#[tokio::test]
async fn select_maps_declared_types() {
    let db = setup().await;
    let people = db.table("Person").unwrap();

    let all: Vec<Person> = people
        .select_as(&db, Select::new().order_by("id", Order::Asc))
        .await
        .unwrap();
    assert_eq!(all.len(), 3);
    assert_eq!(
        all[0],
        Person {
            id: 1,
            name: Some("Ada".into()),
            active: true,
            born: Some(at(1815, 12, 10, 0, 0, 0)),
            salary: Some(100.5),
        }
    );
    assert!(!all[1].active);
    assert_eq!(all[1].born, None);
    assert_eq!(all[2].name.as_deref(), Some("O'Connor"));
}

#[tokio::test]
async fn conditions_filter_rows() {
    let db = setup().await;
    let people = db.table("Person").unwrap();

    let rows = people
        .select(
            &db,
            Select::new()
                .fields(["id"])
                .filter(|c| {
                    c.equals([("active", true)])
                        .group(|g| g.starts_with([("name", "A")]).or().ends_with([("name", "nor")]))
                })
                .order_by("id", Order::Desc),
        )
        .await
        .unwrap();
    let ids: Vec<i64> = rows.iter().map(|r| r.try_get("id").unwrap()).collect();
    assert_eq!(ids, vec![3, 1]);

    let none = people
        .select(&db, Condition::new().in_list([("id", Vec::<i64>::new())]))
        .await
        .unwrap();
    assert!(none.is_empty());
}

#[tokio::test]
async fn select_one_and_missing_row() {
    let db = setup().await;
    let people = db.table("Person").unwrap();

    let bob = people
        .select_one_as::<Person>(&db, Condition::new().equals([("name", "Bob")]))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(bob.id, 2);

    let missing = people
        .select_one(&db, Condition::new().equals([("id", 99)]))
        .await
        .unwrap();
    assert!(missing.is_none());
}

#[tokio::test]
async fn any_matches_count() {
    let db = setup().await;
    let people = db.table("Person").unwrap();

    let conditions = [
        None,
        Some(Condition::new().equals([("active", true)])),
        Some(Condition::new().equals([("name", "nobody")])),
        Some(Condition::new().between([("id", (2, 3))])),
    ];
    for cond in &conditions {
        let count = people.count(&db, cond.as_ref()).await.unwrap();
        let any = people.any(&db, cond.as_ref()).await.unwrap();
        assert_eq!(any, count > 0);
    }
    assert_eq!(people.count(&db, None).await.unwrap(), 3);
    assert_eq!(
        people
            .count(&db, Some(&Condition::new().between([("id", (2, 3))])))
            .await
            .unwrap(),
        2
    );
}

#[tokio::test]
async fn datetime_round_trip_and_range_filter() {
    let db = setup().await;
    let people = db.table("Person").unwrap();

    let when = at(2024, 2, 29, 23, 59, 59);
    people
        .update(
            &db,
            [("born", when)],
            Some(&Condition::new().equals([("id", 2)])),
        )
        .await
        .unwrap();

    let bob = people
        .select_one(&db, Condition::new().equals([("id", 2)]))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(bob.get("born"), Some(&Value::DateTime(when)));

    let in_2024 = people
        .count(
            &db,
            Some(&Condition::new().between([(
                "born",
                ("2024-01-01 00:00:00", "2024-12-31 23:59:59"),
            )])),
        )
        .await
        .unwrap();
    assert_eq!(in_2024, 1);
}

#[tokio::test]
async fn five_digit_year_round_trips() {
    let db = setup().await;
    let people = db.table("Person").unwrap();

    let far = at(10000, 6, 1, 12, 0, 0);
    people
        .insert(&db, Record::new().with("id", 5).with("active", true).with("born", far))
        .await
        .unwrap();
    let row = people
        .select_one(&db, Condition::new().equals([("id", 5)]))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row.get("born"), Some(&Value::DateTime(far)));
}

#[tokio::test]
async fn null_round_trip() {
    let db = setup().await;
    let people = db.table("Person").unwrap();

    people
        .insert(&db, Record::new().with("id", 4).with("name", None::<String>).with("active", false))
        .await
        .unwrap();
    let row = people
        .select_one(&db, Condition::new().equals([("id", 4)]))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row.get("name"), Some(&Value::Null));
    assert_eq!(row.try_get::<Option<String>>("name").unwrap(), None);
}

#[tokio::test]
async fn upsert_replaces_by_primary_key() {
    let db = setup().await;
    let people = db.table("Person").unwrap();

    let err = people
        .insert(&db, Record::new().with("id", 1).with("active", true))
        .await
        .unwrap_err();
    assert!(err.is_constraint_violation());

    people
        .upsert(&db, Record::new().with("id", 1).with("name", "Ada L.").with("active", true))
        .await
        .unwrap();
    let ada = people
        .select_one_as::<Person>(&db, Condition::new().equals([("id", 1)]))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(ada.name.as_deref(), Some("Ada L."));
    assert_eq!(people.count(&db, None).await.unwrap(), 3);
}

#[tokio::test]
async fn boolean_check_constraint_enforced() {
    let db = setup().await;
    let people = db.table("Person").unwrap();

    let err = people
        .insert(&db, Record::new().with("id", 9).with("active", 2))
        .await
        .unwrap_err();
    assert!(err.is_constraint_violation());
}

#[tokio::test]
async fn update_and_delete() {
    let db = setup().await;
    let people = db.table("Person").unwrap();

    let changed = people
        .update(
            &db,
            Record::new().with("active", false),
            Some(&Condition::new().equals([("active", true)])),
        )
        .await
        .unwrap();
    assert_eq!(changed, 2);
    assert!(!people
        .any(&db, Some(&Condition::new().equals([("active", true)])))
        .await
        .unwrap());

    let removed = people
        .delete(&db, &Condition::new().in_list([("id", [1, 2])]))
        .await
        .unwrap();
    assert_eq!(removed, 2);
    assert_eq!(people.count(&db, None).await.unwrap(), 1);

    let err = people.delete(&db, &Condition::new()).await.unwrap_err();
    assert!(matches!(err, OrmError::Validation(_)));
    assert_eq!(people.count(&db, None).await.unwrap(), 1);
}

#[tokio::test]
async fn insert_many_empty_is_noop() {
    let db = setup().await;
    let people = db.table("Person").unwrap();

    let n = people
        .insert_many(&db, Vec::<Record>::new())
        .await
        .unwrap();
    assert_eq!(n, 0);
    assert_eq!(people.count(&db, None).await.unwrap(), 3);
}

#[tokio::test]
async fn insert_many_chunks_are_atomic() {
    let db = setup().await;
    let people = db.table("Person").unwrap();

    // Row 600 collides with an existing key in the second chunk.
    let records: Vec<Record> = (100..700)
        .map(|i| Record::new().with("id", if i == 600 { 1 } else { i }).with("active", true))
        .collect();
    let err = people.insert_many(&db, records).await.unwrap_err();
    assert!(err.is_constraint_violation());
    assert_eq!(people.count(&db, None).await.unwrap(), 3);

    let records: Vec<Record> = (100..700)
        .map(|i| Record::new().with("id", i).with("active", true))
        .collect();
    assert_eq!(people.insert_many(&db, records).await.unwrap(), 600);
    assert_eq!(people.count(&db, None).await.unwrap(), 603);
}

#[tokio::test]
async fn select_each_isolates_bad_rows() {
    let db = setup().await;
    let people = db.table("Person").unwrap();

    // MONEY has no CHECK constraint, so raw SQL can store non-numeric text.
    db.exec(r#"UPDATE "Person" SET "salary" = 'lots' WHERE "id" = 2"#)
        .await
        .unwrap();

    let each = people
        .select_each(&db, Select::new().order_by("id", Order::Asc))
        .await
        .unwrap();
    assert_eq!(each.len(), 3);
    assert!(each[0].is_ok());
    assert!(matches!(each[1], Err(OrmError::Decode { .. })));
    assert!(each[2].is_ok());

    let strict = people.select(&db, Select::new()).await;
    assert!(matches!(strict, Err(OrmError::Decode { .. })));
}

#[tokio::test]
async fn reserved_and_mixed_case_identifiers_round_trip() {
    let schema = Schema::builder("Order")
        .primary("select", ColumnType::Integer)
        .column("Group", ColumnInfo::sized(ColumnType::NVarChar, 10))
        .column("from", ColumnInfo::new(ColumnType::DateTime))
        .build()
        .unwrap();
    let db = Database::init(DbConfig::in_memory(), [schema]).await.unwrap();
    let orders = db.table("Order").unwrap();

    let when = at(2000, 1, 1, 12, 0, 0);
    orders
        .insert(
            &db,
            Record::new()
                .with("select", 1)
                .with("Group", "a\"b")
                .with("from", when),
        )
        .await
        .unwrap();

    let row = orders
        .select_one(&db, Condition::new().equals([("Group", "a\"b")]))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row.try_get::<i64>("select").unwrap(), 1);
    assert_eq!(row.get("from"), Some(&Value::DateTime(when)));
}

#[tokio::test]
async fn field_reference_compares_columns() {
    let schema = Schema::builder("pairs")
        .column("a", ColumnInfo::new(ColumnType::Integer))
        .column("b", ColumnInfo::new(ColumnType::Integer))
        .build()
        .unwrap();
    let db = Database::init(DbConfig::in_memory(), [schema]).await.unwrap();
    let pairs = db.table("pairs").unwrap();
    pairs
        .insert_many(
            &db,
            [
                Record::new().with("a", 1).with("b", 1),
                Record::new().with("a", 1).with("b", 2),
            ],
        )
        .await
        .unwrap();

    let same = pairs
        .count(&db, Some(&Condition::new().equals([("a", Condition::field("b"))])))
        .await
        .unwrap();
    assert_eq!(same, 1);
}
