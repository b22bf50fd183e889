//! The agent tree
//!
//! ```text
//! orchestrator
//! ├── work ──────── calendar, file_search, github
//! └── leisure ───── books, movies, recommender
//! ```
//!
//! Every node is an [`AgentSpec`]; parents reach children through
//! [`DelegateTool`]s named `<child>_agent_query`. Leaf tools get their
//! backends from [`Collaborators`], so tests can swap in fakes.

use std::sync::Arc;

use agent_core::{AgentError, AgentSpec, DelegateTool, ModelConfig, Tool, tool::DateTimeTool};

use crate::calendar::{CalendarClient, GoogleCalendarClient};
use crate::config::{ConciergeConfig, GithubAgentSection};
use crate::error::ToolError;
use crate::mcp::{McpClient, McpTool, ServerCommand};
use crate::model::documents;
use crate::prompts;
use crate::sources::{
    BookCatalog, OmdbClient, OpenLibraryClient, PostFeed, SubstackClient, TitleCatalog, VideoFeed, YouTubeClient,
};
use crate::store::JsonListStore;
use crate::svckit::{
    AddChannelTool, AddNewsletterTool, AddToReadingListTool, AddToWatchlistTool, BookListsTool, CreateEventTool,
    FileReadTool, FindFolderTool, GetEventsTool, ListChannelsTool, ListNewslettersTool, MarkBookReadTool,
    MarkWatchedTool, MovieListsTool, RecentPostsTool, RecentVideosTool, SearchBookTool, SearchTitlesTool,
};

/// Environment variable the GitHub MCP server reads its token from
const GITHUB_SERVER_TOKEN_ENV: &str = "GITHUB_PERSONAL_ACCESS_TOKEN";

/// One node of the tree, for listings
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AgentInfo {
    pub id: &'static str,
    pub display_name: &'static str,
    pub parent: Option<&'static str>,

    /// Also the description of the delegate tool that reaches this agent
    pub description: &'static str,
}

/// Every agent, parents before children
pub const AGENTS: &[AgentInfo] = &[
    AgentInfo {
        id: "orchestrator",
        display_name: "Concierge",
        parent: None,
        description: "Talks to you and routes each request to the work or leisure assistant.",
    },
    AgentInfo {
        id: "work",
        display_name: "Work",
        parent: Some("orchestrator"),
        description: "Query the work assistant about the calendar, files in local projects and GitHub. Useful for \
                      scheduling, planning implementation tasks, and repositories, issues or pull requests.",
    },
    AgentInfo {
        id: "leisure",
        display_name: "Leisure",
        parent: Some("orchestrator"),
        description: "Query the leisure assistant about books, movies and shows, and the newsletters and YouTube \
                      channels the user follows. Use it for 'what should I watch or read' questions.",
    },
    AgentInfo {
        id: "calendar",
        display_name: "Calendar",
        parent: Some("work"),
        description: "Query the Google Calendar agent to manage calendar events. Can retrieve events, create new \
                      events, and provide scheduling assistance.",
    },
    AgentInfo {
        id: "file_search",
        display_name: "File Search",
        parent: Some("work"),
        description: "Query the file search agent to find and analyze files in a project. Useful for understanding \
                      project structure, finding specific files, or analyzing code for implementation tasks.",
    },
    AgentInfo {
        id: "github",
        display_name: "GitHub",
        parent: Some("work"),
        description: "Query the GitHub agent about repositories, issues, pull requests, branches and commits.",
    },
    AgentInfo {
        id: "books",
        display_name: "Books",
        parent: Some("leisure"),
        description: "Query the books agent to manage the reading list and reading history, look up books and \
                      get reading recommendations.",
    },
    AgentInfo {
        id: "movies",
        display_name: "Movies",
        parent: Some("leisure"),
        description: "Query the movies agent to manage the watchlist and watch history, look up movies and shows \
                      and get recommendations for what to watch.",
    },
    AgentInfo {
        id: "recommender",
        display_name: "Recommender",
        parent: Some("leisure"),
        description: "Query the recommender agent about monitored Substack newsletters and YouTube channels and \
                      their latest posts and videos.",
    },
];

pub fn agent_info(id: &str) -> Option<&'static AgentInfo> {
    AGENTS.iter().find(|a| a.id == id)
}

/// Backends for the leaf tools
pub struct Collaborators {
    pub calendar: Arc<dyn CalendarClient>,
    pub titles: Arc<dyn TitleCatalog>,
    pub books: Arc<dyn BookCatalog>,
    pub posts: Arc<dyn PostFeed>,
    pub videos: Arc<dyn VideoFeed>,

    /// Tools of the GitHub agent; when empty the agent is left out of the tree
    pub github_tools: Vec<Arc<dyn Tool>>,
}

impl Collaborators {
    /// Production backends sharing one HTTP client; GitHub is connected separately
    pub fn from_config(config: &ConciergeConfig, http: &reqwest::Client) -> Self {
        let calendar = &config.calendar_agent;
        Self {
            calendar: Arc::new(GoogleCalendarClient::new(
                http.clone(),
                calendar.calendar_id.clone(),
                calendar.token_env.clone(),
            )),
            titles: Arc::new(OmdbClient::new(http.clone())),
            books: Arc::new(OpenLibraryClient::new(http.clone())),
            posts: Arc::new(SubstackClient::new(http.clone())),
            videos: Arc::new(YouTubeClient::new(http.clone())),
            github_tools: Vec::new(),
        }
    }

    pub fn with_github_tools(mut self, tools: Vec<Arc<dyn Tool>>) -> Self {
        self.github_tools = tools;
        self
    }
}

/// Start the GitHub MCP server and complete the handshake
pub async fn connect_github(section: &GithubAgentSection) -> Result<Arc<McpClient>, ToolError> {
    let token_env = &section.mcp.token_env;
    let token = std::env::var(token_env)
        .ok()
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| ToolError::MissingCredential(token_env.clone()))?;

    let command = ServerCommand {
        name: "github".into(),
        command: section.mcp.command.clone(),
        args: section.mcp.args.clone(),
        env: vec![(GITHUB_SERVER_TOKEN_ENV.into(), token)],
    };
    Ok(Arc::new(McpClient::spawn(&command).await?))
}

/// The built tree
pub struct AgentTree {
    pub root: Arc<AgentSpec>,

    /// Every spec in the tree, parents before children
    pub specs: Vec<Arc<AgentSpec>>,
}

impl AgentTree {
    pub fn get(&self, id: &str) -> Option<&Arc<AgentSpec>> {
        self.specs.iter().find(|s| s.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }
}

/// Builds the tree from configuration
pub struct AgentFactory<'a> {
    config: &'a ConciergeConfig,
}

impl<'a> AgentFactory<'a> {
    pub const fn new(config: &'a ConciergeConfig) -> Self {
        Self { config }
    }

    fn store(&self, document: &str) -> Arc<JsonListStore> {
        Arc::new(JsonListStore::new(self.config.data_dir.join(document)))
    }

    fn spec(&self, id: &str, model: &ModelConfig, prompt: impl Into<String>) -> agent_core::AgentSpecBuilder {
        let builder = AgentSpec::builder(id, model.clone())
            .system_prompt(prompt)
            .window_size(self.config.window_size);
        match agent_info(id) {
            Some(info) => builder.display_name(info.display_name).description(info.description),
            None => builder,
        }
    }

    pub fn build(&self, collaborators: Collaborators) -> Result<AgentTree, AgentError> {
        let config = self.config;
        let mut specs = Vec::new();
        let mut keep = |spec: AgentSpec| {
            let spec = Arc::new(spec);
            specs.push(Arc::clone(&spec));
            spec
        };

        // Leaves
        let calendar = keep(
            self.spec("calendar", &config.calendar_agent.model, prompts::CALENDAR_PROMPT)
                .tool(GetEventsTool::new(Arc::clone(&collaborators.calendar)))
                .tool(CreateEventTool::new(
                    Arc::clone(&collaborators.calendar),
                    config.calendar_agent.timezone.clone(),
                ))
                .tool(DateTimeTool)
                .build()?,
        );
        let root_dir = &config.files_agent.root_directory;
        let file_search = keep(
            self.spec("file_search", &config.files_agent.model, prompts::FILE_SEARCH_PROMPT)
                .tool(FindFolderTool::new(root_dir.clone()))
                .tool(FileReadTool::new(root_dir.clone()))
                .build()?,
        );
        let github = if collaborators.github_tools.is_empty() {
            tracing::warn!("GitHub tools unavailable; the work agent runs without the GitHub agent");
            None
        } else {
            Some(keep(
                self.spec(
                    "github",
                    &config.github_agent.model,
                    prompts::github_prompt(&config.github_agent.github_username),
                )
                .tools(collaborators.github_tools.iter().cloned())
                .build()?,
            ))
        };

        let movies_store = self.store(documents::MOVIES);
        let movies = keep(
            self.spec("movies", &config.movies_agent.model, prompts::MOVIES_PROMPT)
                .tool(MovieListsTool::new(Arc::clone(&movies_store)))
                .tool(AddToWatchlistTool::new(Arc::clone(&movies_store)))
                .tool(MarkWatchedTool::new(movies_store))
                .tool(SearchTitlesTool::new(Arc::clone(&collaborators.titles)))
                .build()?,
        );
        let books_store = self.store(documents::BOOKS);
        let books = keep(
            self.spec("books", &config.books_agent.model, prompts::BOOKS_PROMPT)
                .tool(BookListsTool::new(Arc::clone(&books_store)))
                .tool(AddToReadingListTool::new(Arc::clone(&books_store)))
                .tool(MarkBookReadTool::new(books_store))
                .tool(SearchBookTool::new(Arc::clone(&collaborators.books)))
                .build()?,
        );
        let newsletters = self.store(documents::NEWSLETTERS);
        let channels = self.store(documents::CHANNELS);
        let recommender = keep(
            self.spec("recommender", &config.recommender_agent.model, prompts::RECOMMENDER_PROMPT)
                .tool(AddNewsletterTool::new(Arc::clone(&newsletters)))
                .tool(ListNewslettersTool::new(newsletters))
                .tool(RecentPostsTool::new(Arc::clone(&collaborators.posts)))
                .tool(RecentVideosTool::new(Arc::clone(&collaborators.videos)))
                .tool(ListChannelsTool::new(Arc::clone(&channels)))
                .tool(AddChannelTool::new(channels))
                .build()?,
        );

        // Middle tier
        let mut work = self
            .spec("work", &config.work_agent.model, prompts::WORK_PROMPT)
            .tool(DelegateTool::new(calendar))
            .tool(DelegateTool::new(file_search));
        if let Some(github) = github {
            work = work.tool(DelegateTool::new(github));
        }
        let work = keep(work.build()?);
        let leisure = keep(
            self.spec("leisure", &config.leisure_agent.model, prompts::LEISURE_PROMPT)
                .tool(DelegateTool::new(books))
                .tool(DelegateTool::new(movies))
                .tool(DelegateTool::new(recommender))
                .build()?,
        );

        let root = keep(
            self.spec("orchestrator", &config.orchestrator.model, prompts::ORCHESTRATOR_PROMPT)
                .tool(DelegateTool::new(work))
                .tool(DelegateTool::new(leisure))
                .build()?,
        );

        // parents before children
        specs.reverse();
        tracing::info!(agents = specs.len(), "agent tree built");
        Ok(AgentTree { root, specs })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::InMemoryCalendar;
    use crate::error::Result;
    use crate::sources::{BookMatch, PostSummary, TitleMatch, TitleQuery, VideoSummary};
    use async_trait::async_trait;

    struct Nothing;

    #[async_trait]
    impl TitleCatalog for Nothing {
        async fn search_titles(&self, _query: &TitleQuery) -> Result<Vec<TitleMatch>> {
            Ok(Vec::new())
        }
    }

    #[async_trait]
    impl BookCatalog for Nothing {
        async fn search_books(&self, _title: &str, _author: Option<&str>, _limit: usize) -> Result<Vec<BookMatch>> {
            Ok(Vec::new())
        }
    }

    #[async_trait]
    impl PostFeed for Nothing {
        async fn recent_posts(&self, _url: &str, _limit: usize) -> Result<Vec<PostSummary>> {
            Ok(Vec::new())
        }
    }

    #[async_trait]
    impl VideoFeed for Nothing {
        async fn recent_videos(&self, _url: &str, _limit: usize) -> Result<Vec<VideoSummary>> {
            Ok(Vec::new())
        }
    }

    fn offline() -> Collaborators {
        Collaborators {
            calendar: Arc::new(InMemoryCalendar::new()),
            titles: Arc::new(Nothing),
            books: Arc::new(Nothing),
            posts: Arc::new(Nothing),
            videos: Arc::new(Nothing),
            github_tools: Vec::new(),
        }
    }

    fn tool_names(spec: &AgentSpec) -> Vec<String> {
        spec.tools.names()
    }

    #[test]
    fn catalog_parents_come_first() {
        for (i, info) in AGENTS.iter().enumerate() {
            if let Some(parent) = info.parent {
                let parent_index = AGENTS.iter().position(|a| a.id == parent).unwrap();
                assert!(parent_index < i, "{} listed before its parent", info.id);
            }
        }
    }

    #[test]
    fn tree_wires_delegates_and_leaf_tools() {
        let config = ConciergeConfig::template("ollama/llama3.2", "/tmp", "octocat");
        let tree = AgentFactory::new(&config).build(offline()).unwrap();

        assert_eq!(tree.root.id, "orchestrator");
        assert_eq!(tree.specs[0].id, "orchestrator");
        assert_eq!(tool_names(&tree.root), vec!["work_agent_query", "leisure_agent_query"]);
        assert_eq!(
            tool_names(tree.get("leisure").unwrap()),
            vec!["books_agent_query", "movies_agent_query", "recommender_agent_query"]
        );
        assert_eq!(
            tool_names(tree.get("movies").unwrap()),
            vec![
                "get_movies_and_show_list",
                "add_movie_or_show_to_watchlist",
                "mark_movie_or_show_watched",
                "search_omdb_movie_or_show"
            ]
        );
        assert_eq!(tree.get("recommender").unwrap().tools.len(), 6);
        assert!(tree.specs.iter().all(|s| s.window_size == config.window_size));
    }

    #[test]
    fn github_is_left_out_without_tools() {
        let config = ConciergeConfig::template("ollama/llama3.2", "/tmp", "octocat");
        let tree = AgentFactory::new(&config).build(offline()).unwrap();
        assert!(!tree.contains("github"));
        assert_eq!(
            tool_names(tree.get("work").unwrap()),
            vec!["calendar_agent_query", "file_search_agent_query"]
        );

        let with_github = offline().with_github_tools(vec![Arc::new(DateTimeTool)]);
        let tree = AgentFactory::new(&config).build(with_github).unwrap();
        assert!(tree.get("github").unwrap().system_prompt.contains("octocat"));
        assert!(tool_names(tree.get("work").unwrap()).contains(&"github_agent_query".to_owned()));
    }

    #[test]
    fn delegate_descriptions_come_from_the_catalog() {
        let config = ConciergeConfig::template("ollama/llama3.2", "/tmp", "octocat");
        let tree = AgentFactory::new(&config).build(offline()).unwrap();
        let work = tree.get("work").unwrap();
        let schemas = work.tools.schemas();
        let file_search = schemas.iter().find(|s| s.name == "file_search_agent_query").unwrap();
        assert!(file_search.description.starts_with("Query the file search agent"));
    }

    #[tokio::test]
    async fn github_needs_a_token() {
        let mut section = ConciergeConfig::template("ollama/llama3.2", "/tmp", "octocat").github_agent;
        section.mcp.token_env = "CONCIERGE_TEST_UNSET_GITHUB_TOKEN".into();
        let err = connect_github(&section).await.unwrap_err();
        assert!(matches!(err, ToolError::MissingCredential(var) if var == "CONCIERGE_TEST_UNSET_GITHUB_TOKEN"));
    }
}
