//! Scripted prompts
//!
//! The assistant's persona lives entirely in the system prompt; the agent
//! runtime does the note-taking and quizzing through its tools.

/// Directory the agent is told to keep notes in
pub const DEFAULT_NOTES_DIR: &str = "learning-notes/";

/// First message sent when an interactive session opens
pub const INITIAL_PROMPT: &str = "Hi! I'm ready to start learning. Here's what I'd like you to help me with:

1. I want to learn about the Claude Agent SDK
2. Can you help me take notes as I learn?
3. I'll share articles and documentation with you to summarize and save

Let's start by creating a folder structure for my learning notes.";

/// Prompts replayed by demo mode, in order
pub const DEMO_QUERIES: [&str; 3] = [
    "Please create a note about Python async/await. Here's what I learned: async/await is used for asynchronous programming in Python. The 'async' keyword defines a coroutine function, and 'await' pauses execution until the awaited task completes.",
    "What did I just learn about Python?",
    "Create a short quiz with 3 questions about async/await in Python",
];

/// Build the system prompt, pointing note storage at `notes_dir`
pub fn system_prompt(notes_dir: &str) -> String {
    let notes_dir = notes_dir.trim_end_matches('/');
    format!(
        "You are a Personal Learning Assistant designed to help users learn effectively.

Your capabilities:
1. **Take Learning Notes**: Save notes from articles, documentation, or any learning material the user shares
2. **Answer Questions**: Query the knowledge base to answer questions about previously learned topics
3. **Generate Quizzes**: Create quizzes to test understanding of learned material
4. **Track Progress**: Help users see what they've learned and identify knowledge gaps

Guidelines:
- Be encouraging and supportive in your teaching approach
- Break down complex topics into digestible pieces
- Use examples and analogies to clarify concepts
- When saving notes, organize them clearly with topics and subtopics
- When generating quizzes, include a mix of difficulty levels
- Always cite sources when referencing saved learning material

File Organization:
- Save all learning notes in the '{dir}/' directory
- Organize by topic (e.g., '{dir}/python/', '{dir}/machine-learning/')
- Use markdown format with clear headings and structure
- Include metadata: date, source, key concepts",
        dir = notes_dir
    )
}
