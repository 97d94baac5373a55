//! Interactive REPL for chatscript
//!
//! Evaluates prelude calls line by line and fires events at whatever the
//! session has registered.

use anyhow::Result;
use chatscript_script::ScriptEngine;
use rhai::Dynamic;
use rustyline::error::ReadlineError;
use rustyline::history::DefaultHistory;
use rustyline::{CompletionType, Config, EditMode, Editor};
use std::path::{Path, PathBuf};

/// REPL state
pub struct Repl {
    engine: ScriptEngine,
    editor: Editor<(), DefaultHistory>,
    history_path: Option<PathBuf>,
}

impl Repl {
    /// Create a new REPL instance around an engine
    pub fn new(engine: ScriptEngine) -> Result<Self> {
        let config = Config::builder()
            .history_ignore_space(true)
            .completion_type(CompletionType::List)
            .edit_mode(EditMode::Emacs)
            .build();

        let mut editor = Editor::with_config(config)?;

        // Try to load history from the data directory
        let history_path = dirs_path();
        if let Some(ref path) = history_path {
            let _ = editor.load_history(path);
        }

        Ok(Self {
            engine,
            editor,
            history_path,
        })
    }

    /// Run the REPL loop
    pub fn run(&mut self) -> Result<()> {
        println!("{}", WELCOME_MESSAGE);

        let mut multiline_buffer = String::new();
        let mut in_multiline = false;

        loop {
            let prompt = if in_multiline { "...> " } else { "chat> " };

            match self.editor.readline(prompt) {
                Ok(line) => {
                    let trimmed = line.trim();

                    if trimmed.starts_with(':') && !in_multiline {
                        let _ = self.editor.add_history_entry(trimmed);
                        match self.handle_command(trimmed) {
                            CommandResult::Continue => continue,
                            CommandResult::Exit => break,
                            CommandResult::Error(e) => {
                                eprintln!("Error: {}", e);
                                continue;
                            }
                        }
                    }

                    if trimmed.ends_with('\\') {
                        multiline_buffer.push_str(&line[..line.len() - 1]);
                        multiline_buffer.push('\n');
                        in_multiline = true;
                        continue;
                    }

                    let full_input = if in_multiline {
                        multiline_buffer.push_str(&line);
                        let input = multiline_buffer.clone();
                        multiline_buffer.clear();
                        in_multiline = false;
                        input
                    } else {
                        line.clone()
                    };

                    // Unbalanced braces continue on the next line
                    if !is_balanced(&full_input) {
                        multiline_buffer = full_input;
                        multiline_buffer.push('\n');
                        in_multiline = true;
                        continue;
                    }

                    if full_input.trim().is_empty() {
                        continue;
                    }

                    let _ = self.editor.add_history_entry(&full_input);
                    self.eval_and_print(&full_input);
                }
                Err(ReadlineError::Interrupted) => {
                    if in_multiline {
                        println!("^C - input cancelled");
                        multiline_buffer.clear();
                        in_multiline = false;
                    } else {
                        println!("Use :quit or Ctrl+D to exit");
                    }
                }
                Err(ReadlineError::Eof) => {
                    println!("\nGoodbye!");
                    break;
                }
                Err(err) => {
                    eprintln!("Error: {:?}", err);
                    break;
                }
            }
        }

        if let Some(ref path) = self.history_path {
            if let Some(parent) = path.parent() {
                let _ = std::fs::create_dir_all(parent);
            }
            let _ = self.editor.save_history(path);
        }

        Ok(())
    }

    fn eval_and_print(&mut self, input: &str) {
        match self.engine.eval(input) {
            Ok(result) => print_value(&result),
            Err(e) => eprintln!("Error: {:#}", e),
        }
    }

    /// Handle REPL commands
    fn handle_command(&mut self, cmd: &str) -> CommandResult {
        let (command, args) = match cmd.split_once(char::is_whitespace) {
            Some((command, args)) => (command, Some(args.trim())),
            None => (cmd, None),
        };

        match command {
            ":help" | ":h" | ":?" => {
                println!("{}", HELP_MESSAGE);
                CommandResult::Continue
            }
            ":quit" | ":q" | ":exit" => CommandResult::Exit,
            ":fire" | ":f" => match args {
                Some(args) if !args.is_empty() => self.fire(args),
                _ => {
                    println!("Usage: :fire <trigger> [json payload]");
                    CommandResult::Continue
                }
            },
            ":load" | ":l" => match args {
                Some(path) if !path.is_empty() => self.load_script(Path::new(path)),
                _ => {
                    println!("Usage: :load <filename>");
                    CommandResult::Continue
                }
            },
            ":unload" => {
                self.engine.unload();
                println!("All scripts and triggers unloaded");
                CommandResult::Continue
            }
            ":reload" | ":r" => match self.engine.reload() {
                Ok(()) => {
                    println!(
                        "Reloaded {} script(s), {} trigger(s) registered",
                        self.engine.loaded().len(),
                        self.engine.capabilities().triggers().len()
                    );
                    CommandResult::Continue
                }
                Err(e) => CommandResult::Error(format!("{:#}", e)),
            },
            ":triggers" | ":t" => {
                self.list_registrations();
                CommandResult::Continue
            }
            ":vars" | ":v" => {
                let scope = self.engine.scope();
                if scope.is_empty() {
                    println!("No variables defined");
                } else {
                    println!("Variables:");
                    for (name, _constant, value) in scope.iter() {
                        println!("  {} = {}", name, value);
                    }
                }
                CommandResult::Continue
            }
            _ => CommandResult::Error(format!(
                "Unknown command: {}. Type :help for available commands.",
                command
            )),
        }
    }

    fn fire(&mut self, args: &str) -> CommandResult {
        let (trigger, payload) = match args.split_once(char::is_whitespace) {
            Some((trigger, payload)) => (trigger, Some(payload)),
            None => (args, None),
        };

        let result = super::parse_payload(payload)
            .and_then(|payload| self.engine.fire_json(trigger, payload));
        match result {
            Ok(report) => {
                super::print_report(&report);
                for failure in &report.failures {
                    println!("  {} failed: {}", failure.handler, failure.message);
                }
                CommandResult::Continue
            }
            Err(e) => CommandResult::Error(format!("{:#}", e)),
        }
    }

    fn load_script(&mut self, path: &Path) -> CommandResult {
        println!("Loading {}...", super::script_name(path));
        match self.engine.load_file(path) {
            Ok(()) => {
                println!(
                    "OK - {} trigger(s) registered",
                    self.engine.capabilities().triggers().len()
                );
                CommandResult::Continue
            }
            Err(e) => CommandResult::Error(format!("{:#}", e)),
        }
    }

    fn list_registrations(&self) {
        let triggers = self.engine.capabilities().triggers();
        if triggers.is_empty() {
            println!("No triggers registered");
            return;
        }

        println!("Registered triggers:");
        triggers.for_each_handler(|id, trigger, handler| {
            println!("  #{} {} -> {}", id, trigger, handler.name());
        });
    }
}

/// Result of handling a command
enum CommandResult {
    Continue,
    Exit,
    Error(String),
}

fn print_value(value: &Dynamic) {
    if !value.is_unit() {
        println!("=> {}", value);
    }
}

/// Check if braces/brackets/parens are balanced
fn is_balanced(input: &str) -> bool {
    let mut depth = 0i32;
    let mut in_string = false;
    let mut prev_char = '\0';

    for c in input.chars() {
        if c == '"' && prev_char != '\\' {
            in_string = !in_string;
        }

        if !in_string {
            match c {
                '(' | '{' | '[' => depth += 1,
                ')' | '}' | ']' => depth -= 1,
                _ => {}
            }
        }

        prev_char = c;
    }

    depth <= 0
}

/// Get the history file path
fn dirs_path() -> Option<PathBuf> {
    dirs::data_local_dir().map(|d| d.join("chatscript").join("repl_history"))
}

const WELCOME_MESSAGE: &str = r#"
chatscript interactive session

  Register handlers, then fire events at them.
  Type :help for commands.
"#;

const HELP_MESSAGE: &str = r#"
Commands:
  :help, :h, :?          - Show this help message
  :quit, :q, :exit       - Exit the REPL
  :fire <trigger> [json] - Fire an event, e.g. :fire chat {"message": "hi"}
  :load <file>           - Load a script file
  :unload                - Drop every script, function and trigger
  :reload, :r            - Reload the loaded script files
  :triggers, :t          - List registered triggers
  :vars, :v              - Show defined variables

Example:
  register("chat", |e| print("got " + e["message"]));
  :fire chat {"message": "hello"}

Tips:
  - End a line with \ for multiline input
  - Unfinished expressions (unbalanced braces) continue on next line
  - Use Ctrl+C to cancel current input, Ctrl+D to exit
"#;

/// Entry point for the REPL command
pub fn run_repl(engine: ScriptEngine, scripts: &[PathBuf]) -> Result<()> {
    let mut repl = Repl::new(engine)?;
    if !scripts.is_empty() {
        repl.engine.load_files(scripts)?;
        println!("Loaded {} script(s)", scripts.len());
    }
    repl.run()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_balanced() {
        assert!(is_balanced(r#"register("chat", |e| print(e));"#));
        assert!(!is_balanced("fn onChat(event) {"));
        assert!(is_balanced(r#"print("{")"#));
    }
}
