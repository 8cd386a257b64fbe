mod args;
mod errors;
mod histogram;
mod instance_aggregator;
mod parser;
mod progress;
mod rendered_result;
mod slurp;
mod symbol_table;
mod table;
#[cfg(test)]
mod test_utils;
mod utils;

use std::time::Instant;

use rendered_result::JsonResult;

use crate::args::Args;
use crate::args::get_args;
use crate::errors::HprofHistoError;
use crate::slurp::slurp_file;

fn main() {
    std::process::exit(match main_result() {
        Ok(()) => 0,
        Err(err) => {
            eprintln!("error: {err}");
            1
        }
    });
}

fn main_result() -> Result<(), HprofHistoError> {
    let now = Instant::now();
    let Args {
        file_path,
        top,
        config,
        debug,
        json_output,
    } = get_args()?;
    let rendered_result = slurp_file(&file_path, config, debug)?;
    if json_output {
        let json_result = JsonResult::new(&rendered_result.rows, top);
        let json_path = json_result.save_as_file()?;
        println!("JSON output written to '{json_path}'");
    }
    if let Some(warnings) = rendered_result.render_warnings() {
        eprint!("{warnings}");
    }
    print!("{}", rendered_result.serialize(top)?);
    println!("File successfully processed in {:?}", now.elapsed());
    Ok(())
}
