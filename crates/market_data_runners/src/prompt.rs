use anyhow::{bail, Context, Result};
use std::fmt::Display;
use std::io::{BufRead, Write};
use std::str::FromStr;

/// Lists the options and asks until one of them is chosen.
/// An empty answer chooses the first option.
pub fn choose<T, I, O>(what: &str, options: &[T], mut input: I, mut output: O) -> Result<T>
where
    T: Display + FromStr + PartialEq + Clone,
    I: BufRead,
    O: Write,
{
    let first = match options.first() {
        Some(first) => first,
        None => bail!("there are no {}s to choose from", what),
    };

    let listed = options
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ");

    writeln!(output, "Available {}s: {}", what, listed)?;

    loop {
        write!(output, "Choose a {} [{}]: ", what, first)?;
        output.flush()?;

        let mut answer = String::new();
        let number_of_bytes = input
            .read_line(&mut answer)
            .with_context(|| format!("error on reading the chosen {}", what))?;

        if number_of_bytes == 0 {
            bail!("no {} was chosen", what);
        }

        let answer = answer.trim();
        if answer.is_empty() {
            return Ok(first.clone());
        }

        match T::from_str(answer) {
            Ok(chosen) if options.contains(&chosen) => return Ok(chosen),
            _ => writeln!(output, "{} isn't one of the available {}s", answer, what)?,
        }
    }
}
