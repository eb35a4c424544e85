use chrono::{Duration, Utc};
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, Statement};

use engine::{
    Currency, Engine, EngineError, Expense, ExpenseItem, ItemAssignment, Member, MemberId, Money,
    SettlementTransfer, TripCode,
};
use migration::MigratorTrait;
use uuid::Uuid;

async fn engine_with_db() -> (Engine, DatabaseConnection) {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    let engine = Engine::builder()
        .database(db.clone())
        .build()
        .await
        .unwrap();
    (engine, db)
}

fn eur(minor: i64) -> Money {
    Money::new(minor, Currency::Eur)
}

/// A EUR trip with one member per username, in order.
async fn trip_with(engine: &Engine, usernames: &[&str]) -> (TripCode, Vec<Member>) {
    let trip = engine
        .create_trip("Lisbon", Some("Portugal"), Currency::Eur)
        .await
        .unwrap();
    let mut members = Vec::new();
    for username in usernames {
        engine.create_user(username, None, None).await.unwrap();
        members.push(engine.add_member(trip.code, username).await.unwrap());
    }
    (trip.code, members)
}

#[tokio::test]
async fn trip_code_is_three_digits_and_members_are_ordered() {
    let (engine, _db) = engine_with_db().await;
    let (code, members) = trip_with(&engine, &["alice", "bob", "carol"]).await;

    assert!((TripCode::MIN..=TripCode::MAX).contains(&i64::from(code)));
    assert_eq!(code.to_string().len(), 3);

    let loaded = engine.members(code).await.unwrap();
    assert_eq!(loaded, members);
    assert!(loaded.windows(2).all(|pair| pair[0].id < pair[1].id));

    let trip = engine.trip(code).await.unwrap();
    assert_eq!(trip.name, "Lisbon");
    assert_eq!(trip.place.as_deref(), Some("Portugal"));
    assert!(trip.updated_at >= trip.created_at);
}

#[tokio::test]
async fn engine_needs_a_reachable_database() {
    assert!(matches!(
        Engine::builder().build().await,
        Err(EngineError::Database(_))
    ));
    assert!(matches!(
        Engine::builder()
            .database(DatabaseConnection::Disconnected)
            .build()
            .await,
        Err(EngineError::Database(_))
    ));
}

#[tokio::test]
async fn trip_code_is_drawn_from_the_unused_ones() {
    let (engine, db) = engine_with_db().await;
    let backend = db.get_database_backend();
    for code in (TripCode::MIN..=TripCode::MAX).filter(|code| *code != 555) {
        db.execute(Statement::from_sql_and_values(
            backend,
            "INSERT INTO trips (code, name, currency, created_at, updated_at) VALUES (?, ?, ?, ?, ?)",
            vec![
                code.into(),
                "Taken".into(),
                "EUR".into(),
                Utc::now().into(),
                Utc::now().into(),
            ],
        ))
        .await
        .unwrap();
    }

    let trip = engine.create_trip("Last", None, Currency::Eur).await.unwrap();
    assert_eq!(i64::from(trip.code), 555);
    assert!(matches!(
        engine.create_trip("One more", None, Currency::Eur).await,
        Err(EngineError::ExistingKey(_))
    ));
}

#[tokio::test]
async fn shared_hotel_round_trips_through_the_store() {
    let (engine, _db) = engine_with_db().await;
    let (code, members) = trip_with(&engine, &["alice", "bob"]).await;
    let (alice, bob) = (members[0].id, members[1].id);

    let expense = Expense::unitemized(alice, "Hotel", eur(3000), Utc::now(), &[alice, bob]).unwrap();
    let expense_id = engine.add_expense(code, expense.clone()).await.unwrap();
    assert_eq!(expense_id, expense.id);

    let ledger = engine.load_ledger(code).await.unwrap();
    let stored = ledger.expense(expense_id).unwrap();
    assert_eq!(stored.description, "Hotel");
    assert_eq!(stored.amount, eur(3000));
    assert_eq!(stored.items.len(), 1);
    assert_eq!(stored.items[0].id, expense.items[0].id);
    assert_eq!(stored.items[0].assignments, expense.items[0].assignments);

    let balances = engine.trip_balances(code).await.unwrap();
    assert_eq!(balances.net(alice), eur(1500));
    assert_eq!(balances.net(bob), eur(-1500));

    let plan = engine.trip_settlement_plan(code).await.unwrap();
    assert_eq!(
        plan,
        vec![SettlementTransfer {
            from: bob,
            to: alice,
            amount: eur(1500),
        }]
    );
}

#[tokio::test]
async fn partial_assignments_net_out_to_one_transfer() {
    let (engine, _db) = engine_with_db().await;
    let (code, members) = trip_with(&engine, &["a", "b", "c"]).await;
    let (a, b, c) = (members[0].id, members[1].id, members[2].id);

    let now = Utc::now();
    engine
        .add_expense(
            code,
            Expense::unitemized(a, "Lunch", eur(100), now, &[a, b]).unwrap(),
        )
        .await
        .unwrap();
    engine
        .add_expense(
            code,
            Expense::unitemized(b, "Snacks", eur(100), now + Duration::minutes(5), &[b, c])
                .unwrap(),
        )
        .await
        .unwrap();

    let nets = engine.trip_balances(code).await.unwrap().nets();
    assert_eq!(nets[&a], eur(50));
    assert_eq!(nets[&b], eur(0));
    assert_eq!(nets[&c], eur(-50));

    let plan = engine.trip_settlement_plan(code).await.unwrap();
    assert_eq!(plan.len(), 1);
    assert_eq!((plan[0].from, plan[0].to, plan[0].amount), (c, a, eur(50)));
}

#[tokio::test]
async fn itemized_expense_keeps_item_order_and_fixed_shares() {
    let (engine, _db) = engine_with_db().await;
    let (code, members) = trip_with(&engine, &["alice", "bob", "carol"]).await;
    let (alice, bob, carol) = (members[0].id, members[1].id, members[2].id);

    let expense = Expense::new(
        alice,
        "Market",
        eur(1000),
        Utc::now(),
        vec![
            ExpenseItem::new("Wine", eur(600), vec![ItemAssignment::equal(bob)]),
            ExpenseItem::new(
                "Cheese",
                eur(400),
                vec![
                    ItemAssignment::fixed(carol, eur(100)),
                    ItemAssignment::equal(alice),
                    ItemAssignment::equal(bob),
                ],
            ),
        ],
    )
    .unwrap();
    let expense_id = engine.add_expense(code, expense).await.unwrap();

    let ledger = engine.load_ledger(code).await.unwrap();
    let items = ledger.items_of(expense_id).unwrap();
    assert_eq!(
        items.iter().map(|item| item.name.as_str()).collect::<Vec<_>>(),
        vec!["Wine", "Cheese"]
    );
    assert_eq!(
        ledger.assignments_of(items[1].id).unwrap().len(),
        3
    );

    // cheese: carol 100 fixed, alice and bob split 300
    let nets = engine.trip_balances(code).await.unwrap().nets();
    assert_eq!(nets[&alice], eur(1000 - 150));
    assert_eq!(nets[&bob], eur(-600 - 150));
    assert_eq!(nets[&carol], eur(-100));
}

#[tokio::test]
async fn settling_removes_expense_from_balances_once() {
    let (engine, _db) = engine_with_db().await;
    let (code, members) = trip_with(&engine, &["alice", "bob"]).await;
    let (alice, bob) = (members[0].id, members[1].id);

    let expense_id = engine
        .add_expense(
            code,
            Expense::unitemized(alice, "Dinner", eur(3000), Utc::now(), &[alice, bob]).unwrap(),
        )
        .await
        .unwrap();

    engine
        .record_settlement(expense_id, "bob", Utc::now())
        .await
        .unwrap();
    assert!(engine.trip_balances(code).await.unwrap().is_settled());
    assert!(engine.trip_settlement_plan(code).await.unwrap().is_empty());

    let err = engine
        .record_settlement(expense_id, "alice", Utc::now())
        .await
        .unwrap_err();
    assert_eq!(err, EngineError::AlreadySettled(format!("expense {expense_id}")));

    let ledger = engine.load_ledger(code).await.unwrap();
    let settled = ledger.expense(expense_id).unwrap();
    assert_eq!(settled.settlement.as_ref().unwrap().settled_by, "bob");
    assert_eq!(ledger.expenses(false).count(), 0);
    assert_eq!(ledger.expenses(true).count(), 1);
}

#[tokio::test]
async fn concurrent_settlements_only_apply_once() {
    let (engine, _db) = engine_with_db().await;
    let (code, members) = trip_with(&engine, &["alice", "bob"]).await;
    let (alice, bob) = (members[0].id, members[1].id);

    let expense_id = engine
        .add_expense(
            code,
            Expense::unitemized(alice, "Taxi", eur(2000), Utc::now(), &[alice, bob]).unwrap(),
        )
        .await
        .unwrap();

    let (first, second) = tokio::join!(
        engine.record_settlement(expense_id, "alice", Utc::now()),
        engine.record_settlement(expense_id, "bob", Utc::now()),
    );
    let outcomes = [first, second];
    assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(
        outcomes
            .iter()
            .any(|r| matches!(r, Err(EngineError::AlreadySettled(_))))
    );
}

#[tokio::test]
async fn settling_one_item_keeps_the_rest_outstanding() {
    let (engine, _db) = engine_with_db().await;
    let (code, members) = trip_with(&engine, &["alice", "bob"]).await;
    let (alice, bob) = (members[0].id, members[1].id);

    let expense = Expense::new(
        alice,
        "Groceries",
        eur(900),
        Utc::now(),
        vec![
            ExpenseItem::new("Bread", eur(300), vec![ItemAssignment::equal(bob)]),
            ExpenseItem::new("Wine", eur(600), vec![ItemAssignment::equal(bob)]),
        ],
    )
    .unwrap();
    let wine = expense.items[1].id;
    let expense_id = engine.add_expense(code, expense).await.unwrap();

    engine
        .record_item_settlement(wine, "bob", Utc::now())
        .await
        .unwrap();
    let balances = engine.trip_balances(code).await.unwrap();
    assert_eq!(balances.net(alice), eur(300));
    assert_eq!(balances.net(bob), eur(-300));

    assert!(matches!(
        engine.record_item_settlement(wine, "bob", Utc::now()).await,
        Err(EngineError::AlreadySettled(_))
    ));

    engine
        .record_settlement(expense_id, "alice", Utc::now())
        .await
        .unwrap();
    let bread = engine.load_ledger(code).await.unwrap().items_of(expense_id).unwrap()[0].id;
    assert!(matches!(
        engine.record_item_settlement(bread, "bob", Utc::now()).await,
        Err(EngineError::AlreadySettled(_))
    ));
}

#[tokio::test]
async fn invalid_expenses_are_rejected_without_writes() {
    let (engine, _db) = engine_with_db().await;
    let (code, members) = trip_with(&engine, &["alice", "bob"]).await;
    let alice = members[0].id;
    let stranger = MemberId::new(members[1].id.value() + 100);

    let outsider = Expense::unitemized(alice, "Fuel", eur(500), Utc::now(), &[alice, stranger])
        .unwrap();
    assert!(matches!(
        engine.add_expense(code, outsider).await,
        Err(EngineError::InconsistentLedger(_))
    ));

    let dollars = Expense::unitemized(
        alice,
        "Souvenir",
        Money::new(500, Currency::Usd),
        Utc::now(),
        &[alice],
    )
    .unwrap();
    assert!(matches!(
        engine.add_expense(code, dollars).await,
        Err(EngineError::CurrencyMismatch(_))
    ));

    let short = Expense::new(
        alice,
        "Market",
        eur(1000),
        Utc::now(),
        vec![ExpenseItem::new("Bread", eur(300), vec![ItemAssignment::equal(alice)])],
    )
    .unwrap();
    assert!(matches!(
        engine.add_expense(code, short).await,
        Err(EngineError::InconsistentLedger(_))
    ));

    assert_eq!(engine.load_ledger(code).await.unwrap().expenses(true).count(), 0);
}

#[tokio::test]
async fn missing_keys_and_duplicates() {
    let (engine, _db) = engine_with_db().await;
    let (code, _members) = trip_with(&engine, &["alice"]).await;

    let unknown_trip = TripCode::try_from(if i64::from(code) == 999 { 998 } else { 999 }).unwrap();
    assert!(matches!(
        engine.load_ledger(unknown_trip).await,
        Err(EngineError::KeyNotFound(_))
    ));
    assert!(matches!(
        engine.record_settlement(Uuid::new_v4(), "alice", Utc::now()).await,
        Err(EngineError::KeyNotFound(_))
    ));
    assert!(matches!(
        engine.add_member(code, "nobody").await,
        Err(EngineError::KeyNotFound(_))
    ));
    assert!(matches!(
        engine.create_user("ALICE", None, None).await,
        Err(EngineError::ExistingKey(_))
    ));
    assert!(matches!(
        engine.add_member(code, "Alice").await,
        Err(EngineError::ExistingKey(_))
    ));
    assert!(matches!(
        engine.create_trip("   ", None, Currency::Eur).await,
        Err(EngineError::InvalidName(_))
    ));
}

#[tokio::test]
async fn settlement_by_non_member_is_rejected() {
    let (engine, _db) = engine_with_db().await;
    let (code, members) = trip_with(&engine, &["alice", "bob"]).await;
    let (alice, bob) = (members[0].id, members[1].id);
    engine.create_user("mallory", None, None).await.unwrap();

    let expense_id = engine
        .add_expense(
            code,
            Expense::unitemized(alice, "Museum", eur(2400), Utc::now(), &[alice, bob]).unwrap(),
        )
        .await
        .unwrap();
    assert!(matches!(
        engine.record_settlement(expense_id, "mallory", Utc::now()).await,
        Err(EngineError::KeyNotFound(_))
    ));
    assert!(!engine.trip_balances(code).await.unwrap().is_settled());
}

#[tokio::test]
async fn corrupted_item_sum_is_reported_on_load() {
    let (engine, db) = engine_with_db().await;
    let (code, members) = trip_with(&engine, &["alice", "bob"]).await;
    let (alice, bob) = (members[0].id, members[1].id);

    let expense_id = engine
        .add_expense(
            code,
            Expense::unitemized(alice, "Ferry", eur(1200), Utc::now(), &[alice, bob]).unwrap(),
        )
        .await
        .unwrap();

    let backend = db.get_database_backend();
    db.execute(Statement::from_sql_and_values(
        backend,
        "UPDATE expense_items SET amount_minor = ? WHERE expense_id = ?",
        vec![1100i64.into(), expense_id.to_string().into()],
    ))
    .await
    .unwrap();

    let err = engine.load_ledger(code).await.unwrap_err();
    assert!(matches!(err, EngineError::InconsistentLedger(_)));
    assert!(err.is_integrity_fault());
}
