use anyhow::Result;
use ort::session::Session;

// Prints a model's input/output signature, to check a hand landmark export.
fn main() -> Result<()> {
    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "models/hand_landmark.onnx".to_string());
    let model = Session::builder()?.commit_from_file(&path)?;

    println!("Model: {}", path);
    println!("Inputs:");
    for (i, input) in model.inputs.iter().enumerate() {
        println!("#{}: {} ({:?})", i, input.name, input.input_type);
    }

    println!("Outputs:");
    for (i, output) in model.outputs.iter().enumerate() {
        println!("#{}: {} ({:?})", i, output.name, output.output_type);
    }

    Ok(())
}
