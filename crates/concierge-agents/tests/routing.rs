//! Requests travel down the tree through delegate tools

use std::sync::Arc;

use agent_core::testing::{RecordingHandler, ScriptedProvider, ScriptedResolver, call, reply};
use agent_core::{Agent, AgentEnv, EventKind, ModelConfig, RoutingLimits};
use async_trait::async_trait;
use concierge_agents::calendar::InMemoryCalendar;
use concierge_agents::sources::{
    BookCatalog, BookMatch, PostFeed, PostSummary, TitleCatalog, TitleMatch, TitleQuery, VideoFeed, VideoSummary,
};
use concierge_agents::{AgentFactory, Collaborators, ConciergeConfig};

/// Catalogues that must never be consulted
struct Untouchable;

#[async_trait]
impl TitleCatalog for Untouchable {
    async fn search_titles(&self, _query: &TitleQuery) -> concierge_agents::Result<Vec<TitleMatch>> {
        panic!("title search was not expected");
    }
}

#[async_trait]
impl BookCatalog for Untouchable {
    async fn search_books(
        &self,
        _title: &str,
        _author: Option<&str>,
        _limit: usize,
    ) -> concierge_agents::Result<Vec<BookMatch>> {
        panic!("book search was not expected");
    }
}

#[async_trait]
impl PostFeed for Untouchable {
    async fn recent_posts(&self, _url: &str, _limit: usize) -> concierge_agents::Result<Vec<PostSummary>> {
        panic!("post feed was not expected");
    }
}

#[async_trait]
impl VideoFeed for Untouchable {
    async fn recent_videos(&self, _url: &str, _limit: usize) -> concierge_agents::Result<Vec<VideoSummary>> {
        panic!("video feed was not expected");
    }
}

fn collaborators() -> Collaborators {
    Collaborators {
        calendar: Arc::new(InMemoryCalendar::new()),
        titles: Arc::new(Untouchable),
        books: Arc::new(Untouchable),
        posts: Arc::new(Untouchable),
        videos: Arc::new(Untouchable),
        github_tools: Vec::new(),
    }
}

/// Every agent on its own scripted model id
fn config(data_dir: &std::path::Path) -> ConciergeConfig {
    let mut config = ConciergeConfig::template("scripted/unused", data_dir, "octocat");
    config.orchestrator.model = ModelConfig::new("scripted/root");
    config.work_agent.model = ModelConfig::new("scripted/work");
    config.leisure_agent.model = ModelConfig::new("scripted/leisure");
    config.movies_agent.model = ModelConfig::new("scripted/movies");
    config.books_agent.model = ModelConfig::new("scripted/books");
    config.data_dir = data_dir.to_path_buf();
    config
}

#[tokio::test]
async fn watch_tonight_goes_through_leisure_to_the_watch_history() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("movies_and_shows.json"),
        r#"{"to_watch": [{"title": "Arrival", "genre": "Sci-Fi"}], "watched": [{"title": "Sicario", "rating": 9}]}"#,
    )
    .unwrap();

    let root = Arc::new(ScriptedProvider::new([
        call("leisure_agent_query", r#"{"query": "What should I watch tonight?"}"#),
        reply("Tonight, Arrival from your watchlist."),
    ]));
    let leisure = Arc::new(ScriptedProvider::new([
        call("movies_agent_query", r#"{"query": "Suggest something to watch tonight"}"#),
        reply("The movies assistant suggests Arrival."),
    ]));
    let movies = Arc::new(ScriptedProvider::new([
        call("get_movies_and_show_list", "{}"),
        reply("Arrival: you rated Sicario, also by Villeneuve, 9/10."),
    ]));
    let work = Arc::new(ScriptedProvider::new([]));

    let resolver = ScriptedResolver::new()
        .with("scripted/root", Arc::clone(&root))
        .with("scripted/leisure", Arc::clone(&leisure))
        .with("scripted/movies", Arc::clone(&movies))
        .with("scripted/work", Arc::clone(&work));
    let recorder = Arc::new(RecordingHandler::new());
    let env = Arc::new(AgentEnv::new(Arc::new(resolver), recorder.clone()));

    let config = config(dir.path());
    let tree = AgentFactory::new(&config).build(collaborators()).unwrap();
    let mut agent = Agent::new(Arc::clone(&tree.root), env).unwrap();

    let answer = agent.query("What should I watch tonight?").await.unwrap();
    assert_eq!(answer, "Tonight, Arrival from your watchlist.");

    let results = recorder.tool_results();
    let names: Vec<&str> = results.iter().map(|(name, _, _)| name.as_str()).collect();
    assert_eq!(names, ["get_movies_and_show_list", "movies_agent_query", "leisure_agent_query"]);
    assert!(results.iter().all(|(_, success, _)| *success));
    assert!(results[0].2.starts_with("MOVIE DATA (To Watch: 1, Watched: 1)"));

    // the work branch was never consulted
    assert!(work.requests().is_empty());
    assert_eq!(root.remaining() + leisure.remaining() + movies.remaining(), 0);

    // the movies agent saw its list tool and the lookup guidance
    let request = &movies.requests()[0];
    assert!(request.system_prompt.contains("Always call `get_movies_and_show_list` first"));
    let search = request
        .tools
        .iter()
        .find(|t| t.name == "search_omdb_movie_or_show")
        .unwrap();
    assert!(search.description.contains("Do not use it to browse for recommendations"));
}

#[tokio::test]
async fn events_carry_agent_and_depth() {
    let dir = tempfile::tempdir().unwrap();
    let root = Arc::new(ScriptedProvider::new([
        call("leisure_agent_query", r#"{"query": "What am I reading?"}"#),
        reply("Nothing yet."),
    ]));
    let leisure = Arc::new(ScriptedProvider::new([
        call("books_agent_query", r#"{"query": "List the reading list"}"#),
        reply("Empty."),
    ]));
    let books = Arc::new(ScriptedProvider::new([call("get_book_lists", ""), reply("Your lists are empty.")]));

    let resolver = ScriptedResolver::new()
        .with("scripted/root", root)
        .with("scripted/leisure", leisure)
        .with("scripted/books", books);
    let recorder = Arc::new(RecordingHandler::new());
    let env = Arc::new(AgentEnv::new(Arc::new(resolver), recorder.clone()));

    let config = config(dir.path());
    let tree = AgentFactory::new(&config).build(collaborators()).unwrap();
    Agent::new(Arc::clone(&tree.root), env)
        .unwrap()
        .query("What am I reading?")
        .await
        .unwrap();

    let finished: Vec<(String, usize, String)> = recorder
        .events()
        .into_iter()
        .filter_map(|e| match e.kind {
            EventKind::ToolInvocationResult { name, .. } => Some((e.agent, e.depth, name)),
            _ => None,
        })
        .collect();
    assert_eq!(
        finished,
        [
            ("books".to_owned(), 2, "get_book_lists".to_owned()),
            ("leisure".to_owned(), 1, "books_agent_query".to_owned()),
            ("orchestrator".to_owned(), 0, "leisure_agent_query".to_owned()),
        ]
    );
}

#[tokio::test]
async fn delegation_past_the_depth_ceiling_is_a_tool_error() {
    let dir = tempfile::tempdir().unwrap();
    let root = Arc::new(ScriptedProvider::new([
        call("leisure_agent_query", r#"{"query": "Anything new to read?"}"#),
        reply("I could not reach the leisure assistant."),
    ]));
    let leisure = Arc::new(ScriptedProvider::new([]));

    let resolver = ScriptedResolver::new()
        .with("scripted/root", root)
        .with("scripted/leisure", Arc::clone(&leisure));
    let recorder = Arc::new(RecordingHandler::new());
    let env = Arc::new(
        AgentEnv::new(Arc::new(resolver), recorder.clone()).with_limits(RoutingLimits {
            max_depth: 0,
            max_iterations: 10,
        }),
    );

    let config = config(dir.path());
    let tree = AgentFactory::new(&config).build(collaborators()).unwrap();
    let answer = Agent::new(Arc::clone(&tree.root), env)
        .unwrap()
        .query("Anything new to read?")
        .await
        .unwrap();

    assert_eq!(answer, "I could not reach the leisure assistant.");
    let results = recorder.tool_results();
    assert_eq!(results.len(), 1);
    assert!(!results[0].1);
    assert!(results[0].2.to_lowercase().contains("routing too deep"));
    assert!(leisure.requests().is_empty());
}
