use clap::Parser as ClapParser;
use std::process;

use bytecode::{CodeDecoder, CodeImage, load_image};
use vm::{Interpreter, InterpreterCreateInfo, RuntimeError};

#[derive(ClapParser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Code image to load
    #[arg(help = "The code image file to execute")]
    image: String,

    /// Initial execution stack size in slots
    #[arg(long, default_value_t = 1024)]
    stack_size: usize,

    /// Start at this block instead of the image's entry block
    #[arg(long, help = "Override the entry block id")]
    entry: Option<usize>,

    /// Print decoded blocks instead of executing
    #[arg(long, help = "Dump the decoded code blocks")]
    dump: bool,
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    if let Err(err) = run(&cli) {
        eprintln!("{}: {}", err.kind(), err);
        process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<(), RuntimeError> {
    let image = load_image(&cli.image)?;
    log::info!("loaded {} ({} blocks, entry {})", cli.image, image.blocks.len(), image.entry);

    if cli.dump {
        dump_image(&image);
        return Ok(());
    }

    let info = InterpreterCreateInfo {
        stack_size: cli.stack_size,
        ..Default::default()
    };
    let mut interpreter = Interpreter::new(&image, &info)?;
    let entry = cli.entry.unwrap_or(image.entry);
    for block in entry..image.blocks.len() {
        interpreter.execute(block)?;
    }
    Ok(())
}

fn dump_image(image: &CodeImage) {
    for (id, block) in image.blocks.iter().enumerate() {
        let marker = if id == image.entry { " (entry)" } else { "" };
        println!("== {id}: {}{marker} ==", block.name);
        for (index, string) in block.strings.iter().enumerate() {
            println!("  string {index}: {:?}", String::from_utf8_lossy(string));
        }
        for (index, float) in block.floats.iter().enumerate() {
            println!("  float {index}: {float}");
        }
        let mut decoder = CodeDecoder::new(&block.code);
        loop {
            let offset = decoder.offset();
            match decoder.next() {
                None => break,
                Some(Ok(instruction)) => println!("{offset:>6}  {instruction}"),
                Some(Err(err)) => {
                    println!("{offset:>6}  <{err}>");
                    break;
                }
            }
        }
    }
}
