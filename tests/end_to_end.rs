// Full command path against a scripted desktop: queue, worker, driver.
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use wxdispatch::channel::protocol::{parse_inbound, Inbound};
use wxdispatch::config::FetchConfig;
use wxdispatch::dispatch::command::Command;
use wxdispatch::dispatch::fetcher::AssetFetcher;
use wxdispatch::dispatch::queue::{DispatchQueue, DriverFactory, WorkerHandle};
use wxdispatch::errors::RelayResult;
use wxdispatch::executor::clipboard::Clipboard;
use wxdispatch::executor::driver::{AutomationDriver, Timings};
use wxdispatch::executor::input::{InputDevice, KeyStroke};
use wxdispatch::executor::window::AppWindow;
use wxdispatch::perception::locator::AnchorLocate;
use wxdispatch::perception::types::{Anchor, AnchorMatch};

#[derive(Debug, Clone, PartialEq)]
enum Event {
    Key(KeyStroke),
    Click(i32, i32),
    Text(String),
    Files(Vec<PathBuf>),
    Topmost(bool),
}

/// What the fake desktop knows: contacts that show up in search, and which of
/// them open into a conversation with a compose box.
#[derive(Default)]
struct Desktop {
    events: Vec<Event>,
    clipboard_text: Option<String>,
    contacts: Vec<&'static str>,
    without_compose: Vec<&'static str>,
    /// Whether every pasted file still existed at paste time.
    files_present: Vec<bool>,
}

type Shared = Arc<Mutex<Desktop>>;

struct FakeWindow(Shared);

impl AppWindow for FakeWindow {
    fn describe(&self) -> String {
        "'fake chat'".into()
    }
    fn exists(&self) -> bool {
        true
    }
    fn launch(&mut self) -> RelayResult<()> {
        Ok(())
    }
    fn activate(&mut self) -> RelayResult<()> {
        Ok(())
    }
    fn set_topmost(&mut self, topmost: bool) -> RelayResult<()> {
        self.0.lock().unwrap().events.push(Event::Topmost(topmost));
        Ok(())
    }
}

struct RecordingInput(Shared);

impl InputDevice for RecordingInput {
    fn press(&mut self, stroke: KeyStroke) -> RelayResult<()> {
        self.0.lock().unwrap().events.push(Event::Key(stroke));
        Ok(())
    }
    fn click(&mut self, x: i32, y: i32) -> RelayResult<()> {
        self.0.lock().unwrap().events.push(Event::Click(x, y));
        Ok(())
    }
    fn screen_size(&self) -> RelayResult<(i32, i32)> {
        Ok((1920, 1080))
    }
}

struct RecordingClipboard(Shared);

impl Clipboard for RecordingClipboard {
    fn set_text(&mut self, text: &str) -> RelayResult<()> {
        let mut desktop = self.0.lock().unwrap();
        desktop.clipboard_text = Some(text.to_owned());
        desktop.events.push(Event::Text(text.to_owned()));
        Ok(())
    }
    fn set_files(&mut self, paths: &[PathBuf]) -> RelayResult<()> {
        let mut desktop = self.0.lock().unwrap();
        desktop.files_present = paths.iter().map(|p| p.exists()).collect();
        desktop.events.push(Event::Files(paths.to_vec()));
        Ok(())
    }
}

struct ScriptedAnchors(Shared);

const HIT: AnchorMatch = AnchorMatch {
    x: 100,
    y: 200,
    width: 40,
    height: 20,
    score: 0.95,
};

impl AnchorLocate for ScriptedAnchors {
    fn locate_anchor(&mut self, anchor: Anchor) -> RelayResult<Option<AnchorMatch>> {
        let desktop = self.0.lock().unwrap();
        let searched = desktop.clipboard_text.clone().unwrap_or_default();
        let visible = match anchor {
            Anchor::SearchResult => desktop.contacts.contains(&searched.as_str()),
            Anchor::ComposeToolbar => !desktop.without_compose.contains(&searched.as_str()),
        };
        Ok(visible.then_some(HIT))
    }
    fn click_offset(&self, _anchor: Anchor) -> i32 {
        50
    }
}

fn instant_timings() -> Timings {
    Timings {
        settle: Duration::ZERO,
        text_interval: Duration::ZERO,
        file_interval: Duration::ZERO,
        anchor_timeout: Duration::ZERO,
        anchor_poll: Duration::ZERO,
        launch_timeout: Duration::ZERO,
        launch_poll: Duration::ZERO,
    }
}

fn start(desktop: Shared) -> (DispatchQueue, WorkerHandle) {
    let factory: DriverFactory = Box::new(move || {
        Ok(AutomationDriver::new(
            Box::new(FakeWindow(desktop.clone())),
            Box::new(RecordingInput(desktop.clone())),
            Box::new(RecordingClipboard(desktop.clone())),
            Box::new(ScriptedAnchors(desktop.clone())),
            instant_timings(),
        ))
    });
    let fetcher = AssetFetcher::new(&FetchConfig::default()).unwrap();
    DispatchQueue::spawn(fetcher, factory).unwrap()
}

fn desktop() -> Shared {
    Arc::new(Mutex::new(Desktop {
        contacts: vec!["Alice", "Carol"],
        without_compose: vec!["Carol"],
        ..Desktop::default()
    }))
}

fn command_from(raw: &str) -> Command {
    match parse_inbound(raw.as_bytes()).unwrap() {
        Inbound::SendMessage(request) => request.into_command(),
        other => panic!("not a send request: {other:?}"),
    }
}

#[tokio::test]
async fn emoji_text_reaches_alice_padded() {
    let shared = desktop();
    let (queue, worker) = start(shared.clone());

    let command = command_from(r#"{"method":"sendWechatMessage","chatNames":["Alice"],"messages":["hi 😀"]}"#);
    let result = queue.enqueue(command).unwrap().wait().await.unwrap();
    queue.shutdown();
    tokio::task::spawn_blocking(move || worker.join()).await.unwrap().unwrap();

    assert!(result.success, "{}", result.message);
    let events = shared.lock().unwrap().events.clone();
    assert_eq!(events.first(), Some(&Event::Topmost(true)));
    assert_eq!(events.last(), Some(&Event::Topmost(false)));
    assert!(events.contains(&Event::Text("Alice".into())));
    // Anchor bottom is 220; the click lands 50 px lower, horizontally centred.
    assert!(events.contains(&Event::Click(120, 270)));

    let padded = events
        .iter()
        .position(|e| *e == Event::Text("hi 😀\u{200b}".into()))
        .expect("padded text on clipboard");
    assert_eq!(
        &events[padded + 1..padded + 3],
        &[Event::Key(KeyStroke::Paste), Event::Key(KeyStroke::Send)]
    );
}

#[tokio::test]
async fn unknown_chat_is_a_navigation_failure() {
    let shared = desktop();
    let (queue, worker) = start(shared.clone());

    let result = queue
        .enqueue(Command::new(vec!["Ghost".into()], vec!["x".into()], vec![]))
        .unwrap()
        .wait()
        .await
        .unwrap();
    queue.shutdown();
    tokio::task::spawn_blocking(move || worker.join()).await.unwrap().unwrap();

    assert!(!result.success);
    assert!(result.message.starts_with("navigation failed"), "{}", result.message);
    let events = shared.lock().unwrap().events.clone();
    assert!(events.contains(&Event::Key(KeyStroke::Escape)));
    assert!(!events.contains(&Event::Key(KeyStroke::Send)));
    assert_eq!(events.last(), Some(&Event::Topmost(false)));
}

#[tokio::test]
async fn missing_compose_box_is_reported_separately() {
    let shared = desktop();
    let (queue, worker) = start(shared.clone());

    let result = queue
        .enqueue(Command::new(vec!["Carol".into()], vec!["x".into()], vec![]))
        .unwrap()
        .wait()
        .await
        .unwrap();
    queue.shutdown();
    tokio::task::spawn_blocking(move || worker.join()).await.unwrap().unwrap();

    assert!(!result.success);
    assert!(result.message.contains("does not exist"), "{}", result.message);
}

#[tokio::test]
async fn delivery_stops_at_the_first_failing_chat() {
    let shared = desktop();
    let (queue, worker) = start(shared.clone());

    let result = queue
        .enqueue(Command::new(
            vec!["Alice".into(), "Ghost".into(), "Carol".into()],
            vec!["morning".into()],
            vec![],
        ))
        .unwrap()
        .wait()
        .await
        .unwrap();
    queue.shutdown();
    tokio::task::spawn_blocking(move || worker.join()).await.unwrap().unwrap();

    assert!(!result.success);
    let events = shared.lock().unwrap().events.clone();
    assert!(events.contains(&Event::Text("morning".into())));
    assert!(!events.contains(&Event::Text("Carol".into())));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn images_are_pasted_as_files_and_cleaned_up() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/cat.png"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![7u8; 128]))
        .mount(&server)
        .await;

    let shared = desktop();
    let (queue, worker) = start(shared.clone());
    let command = Command::new(
        vec!["Alice".into()],
        vec![],
        vec![
            format!("{}/cat.png", server.uri()),
            format!("{}/gone.png", server.uri()),
        ],
    );
    let result = queue.enqueue(command).unwrap().wait().await.unwrap();
    queue.shutdown();
    tokio::task::spawn_blocking(move || worker.join()).await.unwrap().unwrap();

    assert!(result.success, "{}", result.message);
    let desktop = shared.lock().unwrap();
    let files: Vec<PathBuf> = desktop
        .events
        .iter()
        .find_map(|e| match e {
            Event::Files(paths) => Some(paths.clone()),
            _ => None,
        })
        .expect("files pasted");
    assert_eq!(files.len(), 1);
    assert!(files[0].to_string_lossy().ends_with(".png"));
    assert_eq!(desktop.files_present, vec![true]);
    // Temporary downloads are gone once the command finished.
    assert!(!files[0].exists());
}
