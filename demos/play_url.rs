//! Fetches a text and an audio stream at the same time, prints the text and plays the audio.
//!
//! A failure in one of the two does not stop the other.

use std::error::Error;
use std::io::Read;
use std::thread;

use audiopipe::playback::Completion;
use audiopipe::source::HttpStream;
use audiopipe::{DecoderRegistry, PlaybackConfig, Player};

fn fetch_text(url: &str) -> Result<String, Box<dyn Error + Send + Sync>> {
    let mut text = String::new();
    HttpStream::get(url)?.read_to_string(&mut text)?;
    Ok(text)
}

fn play(url: &str) -> Result<(), Box<dyn Error + Send + Sync>> {
    let stream = HttpStream::get(url)?;
    let total = stream.content_length();

    // Streams of unknown length complete when drained
    let player = Player::new(DecoderRegistry::with_default_decoders())
        .with_config(PlaybackConfig::default().with_completion(Completion::estimated()));
    let report = player.play(stream, total)?;
    eprintln!(
        "played {:.1}s of {} ({} of {:?} bytes)",
        report.played().as_secs_f32(),
        report.format,
        report.bytes_read,
        report.total_bytes
    );
    Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
    let mut args = std::env::args().skip(1);
    let usage = "usage: play_url <text-url> <audio-url>";
    let text_url = args.next().ok_or(usage)?;
    let audio_url = args.next().ok_or(usage)?;

    let text = thread::spawn(move || fetch_text(&text_url));
    let audio = thread::spawn(move || play(&audio_url));

    match text.join() {
        Ok(Ok(text)) => println!("{text}"),
        Ok(Err(err)) => eprintln!("fetching text failed: {err}"),
        Err(_) => eprintln!("text thread panicked"),
    }
    match audio.join() {
        Ok(Ok(())) => {}
        Ok(Err(err)) => eprintln!("playback failed: {err}"),
        Err(_) => eprintln!("playback thread panicked"),
    }
    Ok(())
}
