/// Scrolling Example
///
/// This example demonstrates:
/// - Driving a ViewController over an in-memory engine with artificial latency
/// - Pivoting, expanding a tree node and scrolling through the result
/// - The debounced loading indicator
///
/// Run with `RUST_LOG=gridsync=debug` to watch compiles and fetches being
/// issued and discarded. `GRIDSYNC_LOADING_DELAY_MS` and
/// `GRIDSYNC_FETCH_MARGIN` override the controller settings.

use gridsync::{
    AppState, ColumnType, ColumnValue, ControllerConfig, MemoryEngine, MemoryQuery, MemoryTable,
    Schema, SortKey, StateStore, ViewController, ViewParams, Viewport,
};
use std::collections::HashMap;
use std::time::Duration;
use tokio::task::LocalSet;

fn build_table() -> MemoryTable {
    let schema = Schema::new(vec![
        ("region".to_string(), ColumnType::String, false),
        ("city".to_string(), ColumnType::String, false),
        ("product".to_string(), ColumnType::String, false),
        ("units".to_string(), ColumnType::Int32, false),
        ("revenue".to_string(), ColumnType::Float64, false),
    ]);
    let mut table = MemoryTable::new("sales", schema);

    let cities = [
        ("West", "Seattle"),
        ("West", "Portland"),
        ("East", "Boston"),
        ("East", "New York"),
        ("South", "Austin"),
    ];
    let products = ["Laptop", "Mouse", "Desk", "Chair", "Monitor"];

    let rows = (0..2_000)
        .map(|i| {
            let (region, city) = cities[i % cities.len()];
            let units = (i % 7 + 1) as i32;
            let mut row = HashMap::new();
            row.insert("region".to_string(), ColumnValue::String(region.to_string()));
            row.insert("city".to_string(), ColumnValue::String(city.to_string()));
            row.insert("product".to_string(), ColumnValue::String(products[i % products.len()].to_string()));
            row.insert("units".to_string(), ColumnValue::Int32(units));
            row.insert("revenue".to_string(), ColumnValue::Float64(units as f64 * 19.99));
            row
        })
        .collect();

    if let Err(e) = table.append_rows(rows) {
        eprintln!("failed to load sample data: {}", e);
    }
    table
}

fn print_state(label: &str, store: &StateStore<MemoryQuery>) {
    let state = store.get_value();
    let view_state = &state.view_state;
    println!(
        "{} (viewport {}..{}, loading: {})",
        label, view_state.viewport.top, view_state.viewport.bottom, view_state.show_loading
    );

    if let Some(error) = &state.last_error {
        println!("   error: {}", error);
    }
    let Some(data_view) = view_state.current_data_view() else {
        println!("   (no rows for the current view yet)\n");
        return;
    };

    println!(
        "   {} total rows, loaded {}..{}",
        data_view.row_count(),
        data_view.offset(),
        data_view.end()
    );
    let visible = view_state.viewport.top..view_state.viewport.bottom.min(view_state.viewport.top + 8);
    for index in visible {
        let Some(row) = data_view.get_row(index) else {
            continue;
        };
        let depth = row.get("_depth").and_then(|v| v.as_index()).unwrap_or(0);
        let marker = match (row.get("_isLeaf"), row.get("_isOpen")) {
            (Some(ColumnValue::Bool(true)), _) => " ",
            (_, Some(ColumnValue::Bool(true))) => "-",
            _ => "+",
        };
        println!(
            "   {:>5} {}{} {:<10} units={} revenue={}",
            index,
            "  ".repeat(depth),
            marker,
            row.get("_pivot").map(|v| v.to_string()).unwrap_or_default(),
            row.get("units").map(|v| v.to_string()).unwrap_or_default(),
            row.get("revenue").and_then(|v| v.to_f64()).map(|v| format!("{:.2}", v)).unwrap_or_default(),
        );
    }
    println!();
}

async fn run() {
    println!("=== GridSync Scrolling Example ===\n");

    let config = match ControllerConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}; using defaults", e);
            ControllerConfig::default()
        }
    };
    println!(
        "loading delay {}ms, fetch margin {} rows\n",
        config.loading_delay_ms, config.fetch_margin
    );

    let table = build_table();
    let engine = MemoryEngine::with_latency(Duration::from_millis(120));
    let controller = ViewController::new(engine, table.base_query(), table.schema().clone(), config);

    let view = ViewParams::new()
        .with_pivots(vec!["region".to_string(), "city".to_string()])
        .with_pivot_leaf_column(Some("product".to_string()))
        .with_sort_key(vec![SortKey::descending("revenue")]);
    let store = StateStore::new(AppState::new(view, Viewport::new(0, 20)));
    controller.initialize(&store);

    // 1. Initial compile and fetch
    print_state("1. Just initialized", &store);
    tokio::time::sleep(Duration::from_millis(400)).await;
    print_state("1. Pivoted by region, city", &store);

    // 2. Expand a region and one of its cities
    store.update(|s| {
        let view_state = s
            .view_state
            .toggle_path(vec!["West".to_string()])
            .toggle_path(vec!["West".to_string(), "Seattle".to_string()]);
        s.with_view_state(view_state)
    });
    tokio::time::sleep(Duration::from_millis(400)).await;
    print_state("2. Expanded West / Seattle", &store);

    // 3. Scroll inside the loaded window, then past it
    store.update(|s| s.with_view_state(s.view_state.scroll_to(5, 25)));
    print_state("3. Scrolled within the window (no fetch)", &store);

    store.update(|s| s.with_view_state(s.view_state.scroll_to(300, 320)));
    tokio::time::sleep(Duration::from_millis(200)).await;
    print_state("3. Scrolled to row 300", &store);

    // 4. Change the pivot twice in quick succession; only the last one lands
    store.update(|s| s.with_view_state(s.view_state.with_pivots(vec!["product".to_string()])));
    store.update(|s| s.with_view_state(s.view_state.with_pivots(vec!["city".to_string()])));
    tokio::time::sleep(Duration::from_millis(400)).await;
    print_state("4. Re-pivoted by city", &store);

    if let Some(query_view) = controller.query_view() {
        println!("Final query: {} rows, pivots {:?}", query_view.row_count, query_view.view_params.pivots());
    }
}

fn main() {
    env_logger::init();

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("failed to start runtime: {}", e);
            return;
        }
    };
    LocalSet::new().block_on(&runtime, run());
}
