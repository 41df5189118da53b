pub fn indent_lines(input: &str, indent_level: usize) -> String {
    let mut output = String::new();

    for (i, line) in input.lines().enumerate() {
        if i > 0 {
            output.push('\n')
        }

        let indented_line = format!("{:indent$}{}", "", line, indent = indent_level);
        output.push_str(&indented_line)
    }

    if input.ends_with('\n') {
        output.push('\n')
    }

    output
}

/// Prefix every line, leaving no trailing whitespace on empty lines
pub fn prefix_lines(prefix: &str, input: &str) -> String {
    let blank_prefix = prefix.trim_end();

    if input.is_empty() {
        return blank_prefix.to_owned();
    }

    input
        .split_inclusive('\n')
        .map(|line| {
            if line.trim_end_matches(['\r', '\n']).is_empty() {
                format!("{}{}", blank_prefix, line)
            } else {
                format!("{}{}", prefix, line)
            }
        })
        .collect::<String>()
}
