use std::path::Path;
use vmlife::config::{ConfigError, ConfigValidationError};
use vmlife::formats::tree::{self, Leaf, Node, Tree};
use vmlife::utils::file;

pub fn print_config_error(source: &str, error: &ConfigError) {
    let categories = match error {
        ConfigError::FailedToReadFile(err) => vec![str_to_tree(&format!(
            "❌ Failed to read file: {}",
            err
        ))],
        ConfigError::FailedToParseToml(err) => parse_error_tree(&err.to_string()),
        ConfigError::FailedToParseYaml(err) => parse_error_tree(&err.to_string()),
        ConfigError::Invalid(validation_errors) => vec![Node(
            String::from("Validation errors"),
            validation_errors
                .iter()
                .map(show_validation_error)
                .collect(),
        )],
    };

    print_tree(Node(config_heading(source), categories));
}

pub fn config_source(config_file: Option<&Path>, current_dir: &Path) -> String {
    match config_file {
        Some(path) => file::display_path(path, current_dir),
        None => String::from("<command line>"),
    }
}

fn parse_error_tree(msg: &str) -> Vec<Tree> {
    vec![Node(
        String::from("❌ Failed to parse config file"),
        vec![Leaf(msg.trim_end().lines().map(String::from).collect())],
    )]
}

fn show_validation_error(validation_error: &ConfigValidationError) -> Tree {
    str_to_tree(&format!("❌ {}", validation_error))
}

fn print_tree(tree: Tree) {
    let content = tree::draw_tree(&tree).unwrap_or_else(|_| String::from("Failed to draw tree\n"));

    eprint!("{}", content); // Already contains newline
    eprintln!()
}

fn config_heading(source: &str) -> String {
    format!("📋 {}", source)
}

fn str_to_tree(msg: &str) -> Tree {
    Leaf(vec![msg.to_owned()])
}
