use std::{io::Write, time::Duration};

use anyhow::Context;
use threadline_client::{
    api::{self, AuthToken, CommentId, PostId},
    render, CommentNode, HtmlSurface, HttpRemote, Prompt, Surface, TextSurface, ThreadConfig,
    ThreadController, ThreadStore, UiState,
};

#[derive(structopt::StructOpt)]
struct Opt {
    #[structopt(short, long, default_value = "http://localhost:8080")]
    host: String,

    /// Replies deeper than this get flattened
    #[structopt(long, default_value = "5")]
    max_depth: usize,

    #[structopt(long, default_value = "30")]
    timeout_secs: u64,

    #[structopt(subcommand)]
    cmd: Command,
}

#[derive(structopt::StructOpt)]
enum Command {
    /// Print the comment thread of a post
    Show { post: String },

    /// Comment on a post
    Comment {
        post: String,
        author: String,
        content: String,
    },

    /// Reply to a comment
    Reply {
        post: String,
        parent: String,
        author: String,
        content: String,
    },

    /// Replace the content of a comment
    Edit {
        post: String,
        comment: String,
        content: String,
    },

    /// Delete a comment, keeping its replies
    Delete {
        post: String,
        comment: String,

        /// Do not ask for confirmation
        #[structopt(short, long)]
        yes: bool,
    },

    /// Render a thread dumped as a JSON list of comments, without any server
    Render {
        post: String,

        #[structopt(long)]
        dump: std::path::PathBuf,

        #[structopt(long)]
        html: bool,
    },
}

struct StdinPrompt {
    assume_yes: bool,
}

impl Prompt for StdinPrompt {
    fn confirm_delete(&self, comment: &CommentNode) -> bool {
        if self.assume_yes {
            return true;
        }
        print!(
            "Delete comment #{} by {}? [y/N] ",
            comment.id, comment.author
        );
        if std::io::stdout().flush().is_err() {
            return false;
        }
        let mut answer = String::new();
        match std::io::stdin().read_line(&mut answer) {
            Ok(_) => matches!(answer.trim(), "y" | "Y" | "yes"),
            Err(_) => false,
        }
    }
}

fn token() -> Option<AuthToken> {
    std::env::var("THREADLINE_TOKEN")
        .ok()
        .filter(|t| api::is_filled(t))
        .map(AuthToken)
}

async fn open(
    opt: &Opt,
    config: &ThreadConfig,
    post: String,
) -> anyhow::Result<ThreadController<HttpRemote>> {
    let remote = HttpRemote::new(opt.host.clone(), token(), config)
        .context("building http client")?;
    ThreadController::open(remote, PostId(post), config.clone())
        .await
        .with_context(|| format!("fetching thread from {}", opt.host))
}

fn show(controller: &ThreadController<HttpRemote>) {
    print!("{}", controller.draw(&TextSurface::default()));
}

fn render_dump(
    config: &ThreadConfig,
    post: String,
    dump: &std::path::Path,
    html: bool,
) -> anyhow::Result<()> {
    let file = std::fs::File::open(dump).with_context(|| format!("opening {dump:?}"))?;
    let comments: Vec<api::Comment> = serde_json::from_reader(std::io::BufReader::new(file))
        .with_context(|| format!("parsing {dump:?} as a list of comments"))?;
    let nodes = comments
        .into_iter()
        .map(|c| CommentNode::from_wire(c, &config.deleted_placeholder))
        .collect::<Result<Vec<_>, _>>()
        .context("validating comments")?;
    let mut store = ThreadStore::new(PostId(post), config);
    store.load(nodes).context("building thread")?;
    let view = render::render(&store, &UiState::default());
    match html {
        true => println!("{}", HtmlSurface.draw(&view)),
        false => print!("{}", TextSurface::default().draw(&view)),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let opt = <Opt as structopt::StructOpt>::from_args();
    let config = ThreadConfig {
        max_depth: opt.max_depth,
        request_timeout: Duration::from_secs(opt.timeout_secs),
        ..ThreadConfig::default()
    };

    match &opt.cmd {
        Command::Show { post } => {
            let c = open(&opt, &config, post.clone()).await?;
            show(&c);
        }
        Command::Comment {
            post,
            author,
            content,
        } => {
            let c = open(&opt, &config, post.clone()).await?;
            let id = c
                .create(author.clone(), content.clone())
                .await
                .context("posting comment")?;
            tracing::info!(comment = %id, "posted");
            show(&c);
        }
        Command::Reply {
            post,
            parent,
            author,
            content,
        } => {
            let c = open(&opt, &config, post.clone()).await?;
            c.reply(
                &CommentId(parent.clone()),
                author.clone(),
                content.clone(),
            )
            .await
            .context("posting reply")?;
            show(&c);
        }
        Command::Edit {
            post,
            comment,
            content,
        } => {
            let c = open(&opt, &config, post.clone()).await?;
            c.edit(&CommentId(comment.clone()), content.clone())
                .await
                .context("editing comment")?;
            show(&c);
        }
        Command::Delete { post, comment, yes } => {
            let c = open(&opt, &config, post.clone()).await?;
            let interaction = render::Interaction {
                target: threadline_client::Target::Comment(CommentId(comment.clone())),
                action: render::ActionKind::Delete,
            };
            c.interact(interaction, &StdinPrompt { assume_yes: *yes })
                .await
                .context("deleting comment")?;
            show(&c);
        }
        Command::Render { post, dump, html } => {
            render_dump(&config, post.clone(), dump, *html)?;
        }
    }

    Ok(())
}
