use anyhow::{bail, Context, Result};
use std::io::{self, Read, Write};
use tbf::ObjectReader;

mod parser;

const USAGE: &str = "\
tbf-dump: convert Tagged Binary Format buffers to text and back

usage: tbf-dump [-i] [-r] < input > output

  default   read a binary object on stdin, print its textual rendering
  -r        reverse: read the textual rendering, emit the binary object
  -i        the buffer uses id-based tags instead of names
";

fn main() -> Result<()> {
    let mut id_mode = false;
    let mut reverse = false;
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "-i" | "--ids" => id_mode = true,
            "-r" | "--reverse" => reverse = true,
            "-h" | "--help" => {
                eprint!("{}", USAGE);
                return Ok(());
            }
            other => bail!("unknown argument {:?}, try --help", other),
        }
    }
    if reverse {
        let mut input = String::new();
        io::stdin().read_to_string(&mut input).context("Failed to read stdin")?;
        let buf = parser::to_bytes(&input, !id_mode).context("Parse error")?;
        io::stdout().write_all(&buf).context("Failed to write stdout")?;
    } else {
        let mut buffer = Vec::new();
        io::stdin().read_to_end(&mut buffer).context("Failed to read stdin")?;
        let reader = ObjectReader::new(&buffer, !id_mode);
        reader.validate().context("Decoding error")?;
        println!("{}", reader);
    }
    Ok(())
}
