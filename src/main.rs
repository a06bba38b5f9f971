fn main() {
    face_relay::run_cli();
}
