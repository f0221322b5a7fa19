use gtk::prelude::*;
use gtk::{glib, Application, Label, ListBox, Orientation, ScrolledWindow};
use libadwaita::{prelude::*, ApplicationWindow, ColorScheme, HeaderBar, StyleManager, ToolbarView};
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;

use anyhow::Context;
use chrono::Utc;
use log::{debug, info, warn};

use sentiment_map::backdrop::{self, Backdrop, BackdropTicket};
use sentiment_map::config::AppConfig;
use sentiment_map::data::{parse_events, APP_ID};
use sentiment_map::scene::ResizeBus;
use sentiment_map::widget::ShumateContainer;
use sentiment_map::{sample, MapComponent, SentimentEvent, SurfaceEvent};

type SharedMap = Rc<RefCell<MapComponent<ShumateContainer>>>;

fn main() -> glib::ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = match AppConfig::load() {
        Ok(config) => config,
        Err(err) => {
            warn!("Failed to load config, using defaults: {err}");
            AppConfig::default()
        }
    };

    let app = Application::builder()
        .application_id(APP_ID)
        .build();

    app.connect_activate(move |app| build_ui(app, &config));
    app.run()
}

fn load_events(config: &AppConfig) -> anyhow::Result<Vec<SentimentEvent>> {
    let Some(path) = &config.events_path else {
        return Ok(sample::generate(config.sample_size, config.sample_seed));
    };
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading events from {}", path.display()))?;
    let events = parse_events(&text).with_context(|| format!("parsing events in {}", path.display()))?;
    info!("Loaded {} events from {}", events.len(), path.display());
    Ok(events)
}

/// Labels of the selected-event panel.
#[derive(Clone)]
struct DetailPanel {
    container: gtk::Box,
    title: Label,
    sentiment: Label,
    meta: Label,
    tags: Label,
}

impl DetailPanel {
    fn new() -> Self {
        let container = gtk::Box::builder()
            .orientation(Orientation::Vertical)
            .spacing(6)
            .build();
        container.add_css_class("event-detail");

        let title = Label::builder()
            .label("Select an event on the map")
            .wrap(true)
            .xalign(0.0)
            .build();
        title.add_css_class("event-title");

        let sentiment = Label::builder().xalign(0.0).visible(false).build();
        sentiment.add_css_class("badge");

        let meta = Label::builder().wrap(true).xalign(0.0).build();
        meta.add_css_class("event-meta");

        let tags = Label::builder().wrap(true).xalign(0.0).build();
        tags.add_css_class("event-meta");

        container.append(&title);
        container.append(&sentiment);
        container.append(&meta);
        container.append(&tags);

        Self {
            container,
            title,
            sentiment,
            meta,
            tags,
        }
    }

    fn show(&self, event: &SentimentEvent) {
        self.title.set_label(&event.title);

        for class in ["badge-positive", "badge-negative", "badge-neutral"] {
            self.sentiment.remove_css_class(class);
        }
        self.sentiment.add_css_class(&format!("badge-{}", event.sentiment.label()));
        self.sentiment
            .set_label(&format!("{} {:+.2}", event.sentiment.label(), event.score));
        self.sentiment.set_visible(true);

        let mut meta = Vec::new();
        if let Some(address) = &event.address {
            meta.push(address.clone());
        }
        if let Some(source) = &event.source {
            meta.push(source.clone());
        }
        if let Some(age) = event.time_ago(Utc::now()) {
            meta.push(age);
        }
        self.meta.set_label(&meta.join(" · "));
        self.tags.set_label(&event.tags.join(", "));
    }
}

fn create_event_row(event: &SentimentEvent) -> gtk::Box {
    let row = gtk::Box::builder()
        .orientation(Orientation::Vertical)
        .spacing(2)
        .margin_top(6)
        .margin_bottom(6)
        .margin_start(8)
        .margin_end(8)
        .build();

    let title = Label::builder()
        .label(event.title.as_str())
        .xalign(0.0)
        .ellipsize(gtk::pango::EllipsizeMode::End)
        .build();
    title.add_css_class("event-title");

    let mut meta = vec![event.sentiment.label().to_string()];
    if let Some(source) = &event.source {
        meta.push(source.clone());
    }
    if event.plottable_location().is_none() {
        meta.push("no location".to_string());
    }
    let meta = Label::builder().label(meta.join(" · ").as_str()).xalign(0.0).build();
    meta.add_css_class("event-meta");

    row.append(&title);
    row.append(&meta);
    row
}

fn populate_list(list: &ListBox, events: &[SentimentEvent]) {
    list.remove_all();
    for event in events {
        list.append(&create_event_row(event));
    }
}

fn status_text(map: &MapComponent<ShumateContainer>, total: usize) -> String {
    let plotted = map
        .active_layer()
        .map_or(0, |layer| layer.events().len());
    let mode = match map.render_mode() {
        Some(mode) => format!("{mode:?}").to_lowercase(),
        None => "waiting".to_string(),
    };
    format!("{plotted} of {total} plotted · {mode}")
}

fn spawn_backdrop_fetch(
    url: String,
    timeout: Duration,
    ticket: BackdropTicket,
    tx: flume::Sender<(BackdropTicket, Backdrop)>,
) {
    std::thread::spawn(move || {
        let rt = match tokio::runtime::Runtime::new() {
            Ok(rt) => rt,
            Err(err) => {
                warn!("Failed to start backdrop runtime: {err}");
                return;
            }
        };
        let backdrop = rt.block_on(async {
            match reqwest::Client::builder().timeout(timeout).build() {
                Ok(client) => backdrop::load(&client, &url).await,
                Err(err) => {
                    warn!("Failed to build HTTP client: {err}");
                    Backdrop::Minimal
                }
            }
        });
        if tx.send((ticket, backdrop)).is_err() {
            debug!("backdrop dropped, map receiver is gone");
        }
    });
}

fn build_ui(app: &Application, config: &AppConfig) {
    let style_manager = StyleManager::default();
    style_manager.set_color_scheme(ColorScheme::PreferDark);

    let events = match load_events(config) {
        Ok(events) => events,
        Err(err) => {
            warn!("{err:#}, falling back to sample data");
            sample::generate(config.sample_size, config.sample_seed)
        }
    };
    let events = Rc::new(RefCell::new(events));

    let map = libshumate::SimpleMap::new();
    let map_source = libshumate::RasterRenderer::from_url(&config.tile_url);
    map.set_map_source(Some(&map_source));
    map.set_vexpand(true);
    map.set_hexpand(true);
    map.set_height_request(config.map.height as i32);

    let (surface_tx, surface_rx) = flume::unbounded::<SurfaceEvent>();
    let container = ShumateContainer::new(&map, surface_tx);
    let resize = ResizeBus::new();
    let component: SharedMap = Rc::new(RefCell::new(MapComponent::new(
        config.map.clone(),
        config.center,
        config.zoom,
        resize.clone(),
    )));

    let detail = DetailPanel::new();
    let detail_for_map = detail.clone();
    component
        .borrow_mut()
        .set_on_event_click(move |event| detail_for_map.show(event));

    let status_label = Label::builder().label("Loading...").build();
    status_label.add_css_class("monospace");
    status_label.add_css_class("status-display");

    let event_list = ListBox::builder()
        .selection_mode(gtk::SelectionMode::Single)
        .build();
    event_list.add_css_class("boxed-list");
    populate_list(&event_list, &events.borrow());

    let events_for_list = events.clone();
    let detail_for_list = detail.clone();
    event_list.connect_row_activated(move |_, row| {
        let Ok(index) = usize::try_from(row.index()) else {
            return;
        };
        if let Some(event) = events_for_list.borrow().get(index) {
            detail_for_list.show(event);
        }
    });

    {
        let mut map_component = component.borrow_mut();
        map_component.set_events(events.borrow().clone());
        status_label.set_label(&status_text(&map_component, events.borrow().len()));
    }

    let sidebar_content = gtk::Box::builder()
        .orientation(Orientation::Vertical)
        .spacing(12)
        .margin_top(12)
        .margin_bottom(12)
        .margin_start(12)
        .margin_end(12)
        .build();
    sidebar_content.append(&detail.container);
    sidebar_content.append(&event_list);

    let scrolled_window = ScrolledWindow::builder()
        .vexpand(false)
        .hexpand(true)
        .child(&sidebar_content)
        .build();

    let paned = gtk::Paned::builder()
        .orientation(Orientation::Vertical)
        .wide_handle(true)
        .build();
    paned.set_start_child(Some(&scrolled_window));
    paned.set_resize_start_child(false);
    paned.set_shrink_start_child(false);
    paned.set_end_child(Some(&map));
    paned.set_resize_end_child(true);
    paned.set_shrink_end_child(false);
    paned.set_position(200);

    let paned_weak = paned.downgrade();
    paned.add_tick_callback(move |_widget, _clock| {
        if let Some(paned) = paned_weak.upgrade() {
            let width = paned.width();
            let height = paned.height();

            if width > 0 && height > 0 {
                let should_be_horizontal = width > height;
                let is_horizontal = paned.orientation() == Orientation::Horizontal;

                if should_be_horizontal != is_horizontal {
                    if should_be_horizontal {
                        paned.set_orientation(Orientation::Horizontal);
                        paned.set_position(360);
                    } else {
                        paned.set_orientation(Orientation::Vertical);
                        paned.set_position(200);
                    }
                }
            }
        }
        glib::ControlFlow::Continue
    });

    // Forward map allocation changes to the scene.
    let last_size = Cell::new((0, 0));
    let resize_for_tick = resize.clone();
    map.add_tick_callback(move |map, _clock| {
        let size = (map.width(), map.height());
        if size.0 > 0 && size.1 > 0 && size != last_size.get() {
            last_size.set(size);
            resize_for_tick.emit(size.0 as u32, size.1 as u32);
        }
        glib::ControlFlow::Continue
    });

    let component_for_events = component.clone();
    let status_for_events = status_label.clone();
    let events_for_status = events.clone();
    glib::spawn_future_local(async move {
        while let Ok(event) = surface_rx.recv_async().await {
            let ready = event == SurfaceEvent::Ready;
            let mut map_component = component_for_events.borrow_mut();
            map_component.handle_event(event);
            if ready {
                status_for_events.set_label(&status_text(&map_component, events_for_status.borrow().len()));
            }
        }
    });

    let (backdrop_tx, backdrop_rx) = flume::unbounded::<(BackdropTicket, Backdrop)>();
    let component_for_backdrop = component.clone();
    glib::spawn_future_local(async move {
        while let Ok((ticket, backdrop)) = backdrop_rx.recv_async().await {
            let regions = backdrop.region_count();
            if component_for_backdrop.borrow_mut().apply_backdrop(ticket, backdrop) {
                info!("Backdrop applied with {regions} regions");
            }
        }
    });

    let refresh_button = gtk::Button::builder()
        .icon_name("view-refresh-symbolic")
        .tooltip_text("Regenerate sample events")
        .sensitive(config.events_path.is_none())
        .build();

    let seed = Rc::new(Cell::new(config.sample_seed));
    let sample_size = config.sample_size;
    let component_for_refresh = component.clone();
    let events_for_refresh = events.clone();
    let list_for_refresh = event_list.clone();
    let status_for_refresh = status_label.clone();
    refresh_button.connect_clicked(move |_| {
        seed.set(seed.get().wrapping_add(1));
        let fresh = sample::generate(sample_size, seed.get());
        populate_list(&list_for_refresh, &fresh);
        *events_for_refresh.borrow_mut() = fresh.clone();

        let mut map_component = component_for_refresh.borrow_mut();
        map_component.set_events(fresh);
        status_for_refresh.set_label(&status_text(&map_component, events_for_refresh.borrow().len()));
    });

    let header_bar = HeaderBar::builder().build();
    header_bar.pack_start(&refresh_button);
    header_bar.set_title_widget(Some(&status_label));

    let toolbar_view = ToolbarView::builder().build();
    toolbar_view.add_top_bar(&header_bar);
    toolbar_view.set_content(Some(&paned));

    let window = ApplicationWindow::builder()
        .application(app)
        .title("Sentiment Map")
        .default_width(1000)
        .default_height(700)
        .build();

    let css_provider = gtk::CssProvider::new();
    css_provider.load_from_data(
        ".map-marker {
            border-radius: 999px;
            padding: 0;
            min-height: 0;
            min-width: 0;
            font-size: 11px;
            font-weight: bold;
            box-shadow: 0 2px 6px alpha(black, 0.4);
        }
        .map-marker:hover {
            box-shadow: 0 3px 8px alpha(black, 0.5);
        }
        .point-positive { background-color: alpha(@success_bg_color, 0.85); }
        .point-negative { background-color: alpha(@error_bg_color, 0.85); }
        .point-neutral { background-color: alpha(@window_fg_color, 0.45); }
        .cluster-low { background-color: alpha(@accent_bg_color, 0.55); }
        .cluster-medium { background-color: alpha(@accent_bg_color, 0.75); }
        .cluster-high { background-color: alpha(@warning_bg_color, 0.8); }
        .cluster-critical { background-color: alpha(@error_bg_color, 0.9); }
        .status-display {
            font-size: 13px;
            font-weight: 600;
            padding: 4px 12px;
            background-color: alpha(@accent_bg_color, 0.15);
            border-radius: 6px;
        }
        .event-detail {
            background-color: @card_bg_color;
            border-radius: 12px;
            padding: 12px;
            border: 1px solid alpha(@borders, 0.2);
        }
        .event-title {
            font-size: 14px;
            font-weight: 600;
        }
        .event-meta {
            font-size: 11px;
            color: alpha(@window_fg_color, 0.55);
        }
        .badge {
            border-radius: 6px;
            padding: 3px 8px;
            font-size: 10px;
            font-weight: 600;
            text-transform: uppercase;
        }
        .badge-positive {
            background-color: alpha(@success_bg_color, 0.2);
            color: @success_fg_color;
        }
        .badge-negative {
            background-color: alpha(@error_bg_color, 0.2);
            color: @error_fg_color;
        }
        .badge-neutral {
            background-color: alpha(@window_fg_color, 0.08);
            color: alpha(@window_fg_color, 0.7);
        }",
    );

    gtk::style_context_add_provider_for_display(
        &gtk::prelude::WidgetExt::display(&window),
        &css_provider,
        gtk::STYLE_PROVIDER_PRIORITY_APPLICATION,
    );

    let component_for_close = component.clone();
    window.connect_close_request(move |_| {
        component_for_close.borrow_mut().unmount();
        glib::Propagation::Proceed
    });

    window.set_content(Some(&toolbar_view));
    window.present();

    // The map has no root until the window is realized; retry on idle.
    let backdrop_url = config.backdrop_url.clone();
    let backdrop_timeout = Duration::from_secs(config.backdrop_timeout_secs);
    glib::idle_add_local(move || {
        let mut map_component = component.borrow_mut();
        if !map_component.mount(&container) {
            return glib::ControlFlow::Continue;
        }
        if let Some(url) = &backdrop_url {
            if let Some(ticket) = map_component.begin_backdrop() {
                spawn_backdrop_fetch(url.clone(), backdrop_timeout, ticket, backdrop_tx.clone());
            }
        }
        glib::ControlFlow::Break
    });
}
