use std::io::BufRead;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use tracing::info;

use counter_widget::APP_ID;
use counter_widget::actions::{CommandDispatcher, CommandKind, Intent};
use counter_widget::bridge::{InProcessLauncher, NavigationBridge, NavigationRequest, SharedEntry};
use counter_widget::config::WidgetConfig;
use counter_widget::consumer::{CommandConsumer, ConsumerTicker};
use counter_widget::logging;
use counter_widget::render::{Renderer, SurfaceHost, WidgetInstanceId, WidgetSnapshot};
use counter_widget::state::CounterRecord;
use counter_widget::store::{FileStore, SharedStore};

#[derive(Parser)]
#[command(name = "widget", about = "Play the host platform for the counter widget")]
struct Cli {
    /// JSON settings file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Placed widget instance ids.
    #[arg(long, global = true, value_delimiter = ',', default_value = "1")]
    instances: Vec<i32>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Render the given instances (all placed ones if none given).
    Render { ids: Vec<i32> },
    /// Tap a button on the first placed instance.
    Press { button: Button },
    /// Run one consumer pass.
    Consume,
    /// Poll on the configured interval until stdin closes; any line polls now.
    Watch,
    /// Show a product on the widget.
    Publish {
        product_id: String,
        name: String,
        #[arg(long, default_value_t = 0)]
        count: i64,
    },
    /// Open the app on a product, attaching the listener before (warm) or after (cold).
    Open {
        product_id: String,
        #[arg(long)]
        cold: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Button {
    Increase,
    Decrease,
    Reset,
    Open,
}

/// Prints every snapshot the widget pushes.
struct ConsoleHost {
    ids: Vec<WidgetInstanceId>,
}

impl SurfaceHost for ConsoleHost {
    fn instance_ids(&self) -> Vec<WidgetInstanceId> {
        self.ids.clone()
    }

    fn update(&self, snapshot: WidgetSnapshot) {
        println!("{snapshot}");
    }
}

fn print_request(r: &NavigationRequest) {
    println!("onNewIntent {{ action: {}, product_id: {} }}", r.action, r.product_id);
}

fn main() -> anyhow::Result<()> {
    logging::init(APP_ID);
    let cli = Cli::parse();
    let config = WidgetConfig::load(cli.config.as_deref())?;

    let file_store = FileStore::open(&config.store_path)?;
    info!(path = %file_store.path().display(), "widget store ready");
    let store: Arc<dyn SharedStore> = Arc::new(file_store);

    let host = Arc::new(ConsoleHost {
        ids: cli.instances.iter().copied().map(WidgetInstanceId).collect(),
    });
    let renderer = Renderer::new(Arc::clone(&store), config.placeholder_name.clone());
    let dispatcher = CommandDispatcher::new(
        Arc::clone(&store),
        host.clone(),
        renderer.clone(),
        config.redraw_on_press,
    );
    let consumer = Arc::new(CommandConsumer::new(
        Arc::clone(&store),
        host.clone(),
        config.placeholder_name.clone(),
    ));

    match cli.command {
        Command::Render { ids } => {
            let ids: Vec<_> = if ids.is_empty() {
                host.instance_ids()
            } else {
                ids.into_iter().map(WidgetInstanceId).collect()
            };
            renderer.on_update(host.as_ref(), &ids);
        }
        Command::Press { button } => {
            let Some(&first) = host.ids.first() else {
                anyhow::bail!("no widget instances placed");
            };
            let snapshot = renderer.render(first);
            let binding = match button {
                Button::Increase => snapshot.button(CommandKind::Increase),
                Button::Decrease => snapshot.button(CommandKind::Decrease),
                Button::Reset => snapshot.button(CommandKind::Reset),
                Button::Open => &snapshot.open,
            };
            let entry = SharedEntry::new();
            binding.fire(&dispatcher, &InProcessLauncher::new(entry.clone()));
            entry.attach(print_request);
        }
        Command::Consume => {
            println!("{:?}", consumer.poll());
        }
        Command::Watch => {
            let ticker = ConsumerTicker::start(Arc::clone(&consumer), config.poll_interval());
            for line in std::io::stdin().lock().lines() {
                line?;
                ticker.poke();
            }
        }
        Command::Publish { product_id, name, count } => {
            consumer.publish(CounterRecord {
                product_id,
                product_name: name,
                current_count: count.max(0),
            })?;
        }
        Command::Open { product_id, cold } => {
            let entry = SharedEntry::new();
            let launcher = if cold {
                InProcessLauncher::new(entry.clone())
            } else {
                entry.on_create(Intent::new("android.intent.action.MAIN"));
                entry.attach(print_request);
                InProcessLauncher::started(entry.clone())
            };
            NavigationBridge::new(Arc::new(launcher)).open(&product_id);
            if cold {
                entry.attach(print_request);
            }
        }
    }

    Ok(())
}
