use std::error::Error;
use std::fs::File;

use audiopipe::playback::Completion;
use audiopipe::{DecoderRegistry, PlaybackConfig, Player};

fn main() -> Result<(), Box<dyn Error>> {
    let mut args = std::env::args().skip(1);
    let path = args.next().ok_or("usage: play_file <path> [--estimated]")?;
    let completion = match args.next().as_deref() {
        Some("--estimated") => Completion::estimated(),
        _ => Completion::Drained,
    };

    let file = File::open(&path)?;
    let len = file.metadata()?.len();

    let player = Player::new(DecoderRegistry::with_default_decoders())
        .with_config(PlaybackConfig::default().with_completion(completion));
    let report = player.play(file, Some(len))?;

    println!(
        "{}: {} ({}), played {:.1}s, {} underruns",
        path,
        report.format,
        report.spec,
        report.played().as_secs_f32(),
        report.underruns
    );
    Ok(())
}
