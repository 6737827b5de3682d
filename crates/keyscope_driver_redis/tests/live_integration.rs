use std::sync::Arc;
use std::time::Duration;

use keyscope_core::{
    BrowserConfig, BrowserContext, DbError, KeyType, MemberBrowser, NoopTelemetry, PendingView,
    SortDirection, SortSpec,
};
use keyscope_core::table::{LoadRange, zset_columns};
use keyscope_driver_redis::{
    RedisConnection, RedisDriver, RedisProfile, RedisStreamApi, RedisZSetSource,
};
use keyscope_test_support::containers;

fn connect(uri: String) -> Result<Arc<RedisConnection>, DbError> {
    let profile = RedisProfile::from_uri(&uri)?;
    let driver = RedisDriver::new();

    let connection = containers::retry_db_operation(Duration::from_secs(30), || {
        let connection = driver.connect(&profile)?;
        connection.ping()?;
        Ok(connection)
    })?;

    Ok(Arc::new(connection))
}

fn seed(connection: &RedisConnection, commands: &[&[&str]]) -> Result<(), DbError> {
    for command in commands {
        let (name, args) = command
            .split_first()
            .ok_or_else(|| DbError::query_failed("empty command"))?;
        connection.run_command(name, args)?;
    }
    Ok(())
}

#[test]
#[ignore = "requires Docker daemon"]
fn redis_live_zset_browse_edit_and_delete() -> Result<(), DbError> {
    containers::with_redis_url(|uri| {
        let connection = connect(uri)?;
        seed(
            &connection,
            &[&["ZADD", "scores", "1", "a", "2", "b", "3", "c"]],
        )?;

        let info = connection.key_info("scores")?;
        assert_eq!(info.key_type, KeyType::SortedSet);
        assert_eq!(info.length, 3);

        let mut browser = MemberBrowser::new(
            BrowserContext::from_key_info("live", &info),
            BrowserConfig::default(),
            RedisZSetSource::new(connection.clone()),
            Arc::new(NoopTelemetry),
            zset_columns(100.0),
            SortSpec::ascending("score"),
        );

        assert!(browser.open());
        let names: Vec<&str> = browser.members().iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);

        assert!(browser.change_sorting("score", SortDirection::Descending));
        assert_eq!(browser.members()[0].name, "c");

        browser.begin_edit("a");
        assert_eq!(browser.apply_edit("a", "5"), Ok(true));
        assert_eq!(browser.members().iter().find(|m| m.name == "a").map(|m| m.score), Some(5.0));

        assert!(browser.search("b"));
        assert_eq!(browser.members().len(), 1);

        assert!(browser.delete_member("b"));
        assert_eq!(connection.key_info("scores")?.length, 2);

        Ok(())
    })
}

#[test]
#[ignore = "requires Docker daemon"]
fn redis_live_pattern_search_scans_past_empty_steps() -> Result<(), DbError> {
    containers::with_redis_url(|uri| {
        let connection = connect(uri)?;

        let names: Vec<String> = (0..600).map(|i| format!("member:{:03}", i)).collect();
        let mut zadd: Vec<&str> = vec!["scores"];
        let scores: Vec<String> = (0..600).map(|i| i.to_string()).collect();
        for (name, score) in names.iter().zip(&scores) {
            zadd.push(score);
            zadd.push(name);
        }
        connection.run_command("ZADD", &zadd)?;

        let info = connection.key_info("scores")?;
        let mut browser = MemberBrowser::new(
            BrowserContext::from_key_info("live", &info),
            BrowserConfig {
                scan_count: 20,
                ..BrowserConfig::default()
            },
            RedisZSetSource::new(connection.clone()),
            Arc::new(NoopTelemetry),
            zset_columns(100.0),
            SortSpec::ascending("score"),
        );

        assert!(browser.open());
        assert!(browser.search("member:55*"));

        // only ten members match, so the scan runs to the end in one search
        assert!(browser.list().next_cursor().is_exhausted());
        assert!(!browser.load_more_items(LoadRange::new(10, 599)));

        let mut found: Vec<&str> = browser.members().iter().map(|m| m.name.as_str()).collect();
        found.sort_unstable();
        assert_eq!(found.len(), 10);
        assert_eq!(found[0], "member:550");
        assert_eq!(browser.table().empty_message(), None);

        Ok(())
    })
}

#[test]
#[ignore = "requires Docker daemon"]
fn redis_live_claim_respects_min_idle_time() -> Result<(), DbError> {
    containers::with_redis_url(|uri| {
        let connection = connect(uri)?;
        seed(
            &connection,
            &[
                &["XADD", "orders", "1-0", "item", "book"],
                &["XGROUP", "CREATE", "orders", "billing", "0"],
                &["XGROUP", "CREATECONSUMER", "orders", "billing", "worker-2"],
                &["XREADGROUP", "GROUP", "billing", "worker-1", "STREAMS", "orders", ">"],
            ],
        )?;

        let mut view = PendingView::new(RedisStreamApi::new(connection), "orders", 500);
        assert!(view.open());
        assert!(view.select_group("billing"));
        assert!(view.select_consumer("worker-1"));
        assert_eq!(view.messages().len(), 1);
        assert_eq!(view.claim_destinations(), vec!["worker-2"]);

        let entries = view.messages().iter().map(|m| m.id).collect();
        let request = view.claim_request("worker-2", 100000000, entries);
        let outcome = view
            .claim(&request)
            .ok_or_else(|| DbError::query_failed("claim failed"))?;

        assert!(outcome.affected.is_empty());
        assert_eq!(view.messages().len(), 1);

        Ok(())
    })
}
