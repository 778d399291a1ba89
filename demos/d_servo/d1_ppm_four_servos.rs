#![no_std]
#![no_main]

use core::{convert::Infallible, future};
use embassy_executor::Spawner;
use embassy_rp::gpio::{Level, Output};
use embassy_time::Timer;
use ppm_servos::{
    Result,
    ppm::{Ppm, PpmStatic},
    schedule::TimerSchedule,
};
use {defmt::info, defmt_rtt as _, panic_probe as _};

static PPM_STATIC: PpmStatic<4> = PpmStatic::new_static();

#[embassy_executor::main]
async fn main(spawner: Spawner) -> ! {
    let err = inner_main(spawner).await.unwrap_err();
    panic!("{err}");
}

async fn inner_main(spawner: Spawner) -> Result<Infallible> {
    let p = embassy_rp::init(Default::default());

    // Four servos on GPIO 10..=13
    let mut pins = [
        Some(Output::new(p.PIN_10, Level::Low)),
        Some(Output::new(p.PIN_11, Level::Low)),
        Some(Output::new(p.PIN_12, Level::Low)),
        Some(Output::new(p.PIN_13, Level::Low)),
    ];
    let ppm = Ppm::new(&PPM_STATIC, |index| {
        pins.get_mut(index)
            .and_then(Option::take)
            .ok_or(index)
    })?;
    defmt::unwrap!(spawner.spawn(ppm_task(ppm)));

    let servos = [
        PPM_STATIC.open(0)?,
        PPM_STATIC.open(1)?,
        PPM_STATIC.open(2)?,
        PPM_STATIC.open(3)?,
    ];
    for servo in &servos {
        servo.center();
        servo.enable();
    }
    // Servo 3 is wired through an inverting driver.
    servos[3].invert();

    // Sweep each servo a quarter turn out of phase with the next.
    for step in (0..=180_u16).step_by(10).chain((0..180).step_by(10).rev()).cycle() {
        for (offset, servo) in (0_u16..).step_by(45).zip(&servos) {
            let degrees = (step + offset) % 181;
            servo.write_degrees(degrees);
        }
        info!("step {} -> servo 0 at {} ns", step, servos[0].read_width());
        Timer::after_millis(100).await;
    }

    future::pending().await
}

#[embassy_executor::task]
async fn ppm_task(mut ppm: Ppm<'static, Output<'static>, 4>) {
    ppm.run(&TimerSchedule).await;
    let _pins = ppm.release();
}
