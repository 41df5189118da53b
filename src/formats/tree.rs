use crate::command::CommandFailure;
use crate::step_result::StepError;
use crate::utils::string;
use crate::validation::Mismatch;
use std::fmt::{self, Write};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Tree {
    Node(String, Vec<Tree>),
    Leaf(Vec<String>),
}

pub use Tree::{Leaf, Node};

const BRANCH: &str = "├─ ";
const EDGE: &str = "└─ ";
const PIPE: &str = "│  ";
const EMPTY: &str = "   ";

pub fn draw_tree(tree: &Tree) -> Result<String, fmt::Error> {
    let mut output = String::new();
    write_tree(&mut output, tree, "", "")?;
    Ok(output)
}

fn write_tree(f: &mut dyn Write, tree: &Tree, first_prefix: &str, rest_prefix: &str) -> fmt::Result {
    match tree {
        Node(title, children) => {
            writeln!(f, "{}{}", first_prefix, title)?;

            let last = children.len().saturating_sub(1);
            for (i, child) in children.iter().enumerate() {
                let (branch, continuation) = if i == last {
                    (EDGE, EMPTY)
                } else {
                    (BRANCH, PIPE)
                };
                write_tree(
                    f,
                    child,
                    &format!("{}{}", rest_prefix, branch),
                    &format!("{}{}", rest_prefix, continuation),
                )?;
            }
        }
        Leaf(lines) => {
            for (i, line) in lines.iter().enumerate() {
                let prefix = if i == 0 { first_prefix } else { rest_prefix };
                writeln!(f, "{}{}", prefix, line)?;
            }
        }
    }

    Ok(())
}

pub fn text_block(content: &str) -> String {
    let prefixed_content = string::prefix_lines("│ ", content);

    if content.ends_with('\n') {
        format!("╭\n{}╰", prefixed_content)
    } else {
        format!("╭\n{}\n╰ (No newline at end)", prefixed_content)
    }
}

// ERROR FORMATTING

pub fn tree_from_step_error(error: &StepError) -> Vec<Tree> {
    match error {
        StepError::CommandFailure(failure) => tree_from_command_failure(failure),
        StepError::OutputMismatch(mismatch) => tree_from_mismatch(mismatch),
    }
}

fn tree_from_command_failure(failure: &CommandFailure) -> Vec<Tree> {
    let command = Node(
        String::from("Command"),
        vec![str_to_tree(failure.command())],
    );

    match failure {
        CommandFailure::NonZeroExit {
            exit_status,
            stderr,
            ..
        } => {
            let mut categories = vec![
                command,
                Node(
                    String::from("Exit code"),
                    vec![str_to_tree(&exit_status.to_string())],
                ),
            ];
            if !stderr.is_empty() {
                categories.push(Node(
                    String::from("Standard error"),
                    vec![Leaf(string_to_lines(&text_block(stderr)))],
                ));
            }
            categories
        }
        CommandFailure::FailedToSpawn { source, .. } => vec![
            command,
            Node(
                String::from("Failed to run"),
                vec![str_to_tree(&source.to_string())],
            ),
        ],
        CommandFailure::FailedToDecodeUtf8 { .. } => {
            vec![command, str_to_tree("Output is not valid UTF-8")]
        }
        CommandFailure::MissingExitCode { .. } => {
            vec![command, str_to_tree("Terminated without an exit code")]
        }
    }
}

fn tree_from_mismatch(mismatch: &Mismatch) -> Vec<Tree> {
    match mismatch {
        Mismatch::OutputMismatch { expected, got } => {
            let is_multi_line = expected.contains('\n') || got.contains('\n');
            if is_multi_line {
                show_multi_line_diff(expected, got)
            } else {
                show_single_line_diff(expected.clone(), got.clone())
            }
        }
        Mismatch::InvalidAddress { got } => vec![Node(
            String::from("Could not obtain a valid IP"),
            show_got(got),
        )],
        Mismatch::MalformedDirective { line_number, line } => vec![Node(
            format!("Line {} is not safe to evaluate in a shell", line_number),
            vec![str_to_tree(line)],
        )],
        Mismatch::NotPositive { got } => vec![Node(
            String::from("Expected a number greater than zero"),
            show_got(got),
        )],
    }
}

fn show_single_line_diff(expected: String, got: String) -> Vec<Tree> {
    vec![
        Node(String::from("Expected"), vec![Leaf(vec![expected])]),
        Node(String::from("Got"), vec![Leaf(vec![got])]),
    ]
}

fn show_multi_line_diff(expected: &str, got: &str) -> Vec<Tree> {
    let expected_lines = string_to_lines(&format!("Expected\n{}", text_block(expected)));
    let got_lines = string_to_lines(&format!("Got\n{}", text_block(got)));

    vec![
        Leaf(expected_lines),
        Leaf(got_lines),
        Node(String::from("Diff"), vec![Leaf(line_diff(expected, got))]),
    ]
}

fn show_got(got: &str) -> Vec<Tree> {
    vec![Node(String::from("Got"), vec![Leaf(vec![got.to_owned()])])]
}

fn line_diff(expected: &str, got: &str) -> Vec<String> {
    diff::lines(expected, got)
        .into_iter()
        .map(|line| match line {
            diff::Result::Left(x) => format!("-{}", x),
            diff::Result::Right(x) => format!("+{}", x),
            diff::Result::Both(x, _) => format!(" {}", x),
        })
        .collect()
}

fn string_to_lines(str: &str) -> Vec<String> {
    str.lines().map(|x| x.to_owned()).collect()
}

fn str_to_tree(msg: &str) -> Tree {
    Leaf(vec![msg.to_owned()])
}

// TESTS
