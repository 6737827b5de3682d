mod cli;
mod render;

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use keyscope_core::table::{hash_columns, zset_columns};
use keyscope_core::{
    BrowserConfig, BrowserContext, ConfigStore, DbError, KeyInfo, KeyType, LogTelemetry,
    MemberBrowser, MemberSource, Notification, NotificationKind, PendingView, SortDirection,
    SortSpec, StreamApi, StreamTab,
};
use keyscope_driver_redis::{
    RedisConnection, RedisDriver, RedisHashSource, RedisProfile, RedisStreamApi, RedisZSetSource,
    sanitize_uri,
};
use log::{error, info};

use crate::cli::Args;
use crate::render::{member_cells, render_table};

const ACTIONS_COLUMN_WIDTH: f32 = 100.0;

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let args = Args::parse();

    match run(&args) {
        Ok(output) => {
            print!("{}", output);
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{}", e);
            eprintln!("keyscope: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> Result<String, DbError> {
    let store = match &args.config {
        Some(path) => ConfigStore::from_path(path.clone()),
        None => ConfigStore::new()?,
    };
    let config = store.load()?;

    let uri = args.uri.clone().unwrap_or_else(|| config.default_uri.clone());
    let profile = RedisProfile::from_uri(&uri)?;
    let connection = Arc::new(RedisDriver::new().connect(&profile)?);

    let key = connection.key_info(&args.key)?;
    info!("Opening {} ({}, {} members)", key.key, key.key_type.label(), key.length);

    let database_id = sanitize_uri(&uri);

    match key.key_type {
        KeyType::SortedSet => {
            let browser = MemberBrowser::new(
                BrowserContext::from_key_info(database_id, &key),
                config.clone(),
                RedisZSetSource::new(connection),
                Arc::new(LogTelemetry),
                zset_columns(ACTIONS_COLUMN_WIDTH),
                SortSpec::ascending("score"),
            );
            browse(browser, args, &config)
        }
        KeyType::Hash => {
            let browser = MemberBrowser::new(
                BrowserContext::from_key_info(database_id, &key),
                config.clone(),
                RedisHashSource::new(connection),
                Arc::new(LogTelemetry),
                hash_columns(ACTIONS_COLUMN_WIDTH),
                SortSpec::ascending("field"),
            );
            browse(browser, args, &config)
        }
        KeyType::Stream => stream(&connection, &key, args, &config),
        other => Err(DbError::NotSupported(format!(
            "'{}' is a {} key; only sorted sets, hashes and streams can be browsed",
            key.key,
            other.label()
        ))),
    }
}

fn browse<S: MemberSource>(
    mut browser: MemberBrowser<S>,
    args: &Args,
    config: &BrowserConfig,
) -> Result<String, DbError> {
    browser.set_viewport_rows(args.rows);

    if !browser.open() {
        return Err(failure(browser.last_error().map(str::to_string).as_deref(), browser.take_notifications()));
    }

    if args.desc {
        if browser.context().key_type != KeyType::SortedSet {
            return Err(DbError::NotSupported(
                "--desc only applies to sorted sets".to_string(),
            ));
        }
        if !browser.change_sorting("score", SortDirection::Descending) {
            return Err(failure(browser.last_error().map(str::to_string).as_deref(), browser.take_notifications()));
        }
    }

    if let Some(pattern) = &args.pattern
        && !browser.search(pattern)
    {
        return Err(failure(browser.last_error().map(str::to_string).as_deref(), browser.take_notifications()));
    }

    if args.skip > 0 {
        browser.scroll_to(args.skip as f32 * config.row_height);
    }

    let rows: Vec<Vec<String>> = browser.visible_members().iter().map(member_cells).collect();
    let mut out = render_table(browser.table().columns(), &rows, config.max_cell_chars);

    if let Some(message) = browser.table().empty_message() {
        out.push_str(message);
        out.push('\n');
    } else {
        let range = browser.visible_range();
        out.push_str(&format!(
            "-- {}-{} of {} --\n",
            range.start + 1,
            range.end,
            browser.table().total_items_count()
        ));
    }

    report(browser.take_notifications());
    Ok(out)
}

fn stream(
    connection: &Arc<RedisConnection>,
    key: &KeyInfo,
    args: &Args,
    config: &BrowserConfig,
) -> Result<String, DbError> {
    let mut view = PendingView::new(
        RedisStreamApi::new(connection.clone()),
        key.key.clone(),
        config.scan_count,
    );

    if !view.open() {
        return Err(failure(view.last_error().map(str::to_string).as_deref(), view.take_notifications()));
    }

    if let Some(group) = &args.group
        && !view.select_group(group)
    {
        return Err(failure(view.last_error().map(str::to_string).as_deref(), view.take_notifications()));
    }

    if let Some(consumer) = &args.consumer
        && !view.select_consumer(consumer)
    {
        return Err(failure(view.last_error().map(str::to_string).as_deref(), view.take_notifications()));
    }

    if let Some(destination) = &args.claim_for {
        let entries = view.messages().iter().map(|message| message.id).collect();
        let request = view.claim_request(destination, args.min_idle, entries);
        if view.claim(&request).is_none() {
            return Err(failure(view.last_error().map(str::to_string).as_deref(), view.take_notifications()));
        }
    }

    let out = render_stream(&view, config);
    report(view.take_notifications());
    Ok(out)
}

fn render_stream<A: StreamApi>(view: &PendingView<A>, config: &BrowserConfig) -> String {
    let now = chrono::Utc::now();

    let rows: Vec<Vec<String>> = match view.tab() {
        StreamTab::Groups => view
            .groups()
            .iter()
            .map(|group| {
                vec![
                    group.name.clone(),
                    group.consumers.to_string(),
                    group.pending.to_string(),
                    group.last_delivered_id.clone(),
                ]
            })
            .collect(),
        StreamTab::Consumers => view
            .consumers()
            .iter()
            .map(|consumer| {
                vec![
                    consumer.name.clone(),
                    consumer.pending.to_string(),
                    consumer.idle_ms.to_string(),
                ]
            })
            .collect(),
        StreamTab::Pending => view
            .messages()
            .iter()
            .map(|message| {
                vec![
                    message.id.to_string(),
                    message
                        .last_delivered_at(now)
                        .format("%Y-%m-%d %H:%M:%S")
                        .to_string(),
                    message.delivered_count.to_string(),
                ]
            })
            .collect(),
    };

    let mut out = render_table(&view.columns(), &rows, config.max_cell_chars);
    if rows.is_empty() {
        out.push_str(keyscope_core::table::NO_RESULTS_FOUND_TEXT);
        out.push('\n');
    }
    out
}

fn report(notifications: Vec<Notification>) {
    for notification in notifications {
        match notification.kind {
            NotificationKind::Error => eprintln!("{}: {}", notification.title, notification.message),
            NotificationKind::Success | NotificationKind::Info => {
                eprintln!("{}. {}", notification.title, notification.message)
            }
        }
    }
}

fn failure(last_error: Option<&str>, notifications: Vec<Notification>) -> DbError {
    let message = last_error
        .map(str::to_string)
        .or_else(|| notifications.last().map(|n| n.message.clone()))
        .unwrap_or_else(|| "request failed".to_string());
    DbError::query_failed(message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use keyscope_core::NoopTelemetry;
    use keyscope_test_support::{FakeHashSource, FakeZSetSource, fixtures};

    fn zset_browser(source: FakeZSetSource) -> MemberBrowser<FakeZSetSource> {
        MemberBrowser::new(
            BrowserContext::new("db", "scores", KeyType::SortedSet, 3),
            BrowserConfig::default(),
            source,
            Arc::new(NoopTelemetry),
            zset_columns(ACTIONS_COLUMN_WIDTH),
            SortSpec::ascending("score"),
        )
    }

    #[test]
    fn browse_prints_visible_rows_in_descending_order() -> Result<(), DbError> {
        let source = FakeZSetSource::new(fixtures::zset_members(6));
        let args = Args::parse_from(["keyscope", "--desc", "--rows", "2", "scores"]);

        let out = browse(zset_browser(source), &args, &BrowserConfig::default())?;

        // two rows on screen plus two of overscan
        assert_eq!(
            out,
            "Member      Score\nmember:005      5\nmember:004      4\nmember:003      3\nmember:002      2\n-- 1-4 of 6 --\n"
        );
        Ok(())
    }

    #[test]
    fn browse_reports_empty_search_results() -> Result<(), DbError> {
        let source = FakeZSetSource::new(fixtures::zset(&[("a", 1.0)]));
        let args = Args::parse_from(["keyscope", "--match", "zzz", "scores"]);

        let out = browse(zset_browser(source), &args, &BrowserConfig::default())?;

        assert!(out.ends_with("No results found.\n"));
        Ok(())
    }

    #[test]
    fn browse_surfaces_fetch_failures() {
        let source = FakeZSetSource::new(Vec::new()).with_fetch_error("LOADING Redis is loading");
        let args = Args::parse_from(["keyscope", "scores"]);

        let result = browse(zset_browser(source), &args, &BrowserConfig::default());

        assert!(matches!(result, Err(DbError::QueryFailed(message)) if message.contains("LOADING")));
    }

    #[test]
    fn descending_order_is_rejected_for_hashes() {
        let browser = MemberBrowser::new(
            BrowserContext::new("db", "profile", KeyType::Hash, 2),
            BrowserConfig::default(),
            FakeHashSource::new(fixtures::hash_fields(2)),
            Arc::new(NoopTelemetry),
            hash_columns(ACTIONS_COLUMN_WIDTH),
            SortSpec::ascending("field"),
        );
        let args = Args::parse_from(["keyscope", "--desc", "profile"]);

        let result = browse(browser, &args, &BrowserConfig::default());

        assert!(matches!(result, Err(DbError::NotSupported(_))));
    }
}
