#![no_std]
#![no_main]

use core::{convert::Infallible, future};
use embassy_executor::Spawner;
use embassy_futures::join::join;
use embassy_rp::gpio::{Level, Output};
use embassy_rp::pac::SIO;
use embassy_time::Timer;
use ppm_servos::{
    Result,
    control::ioctl,
    ppm::{Ppm, PpmStatic},
    register::{OutputRegister, RegisterLine},
    schedule::SpinSchedule,
};
use {defmt::info, defmt_rtt as _, panic_probe as _};

const FIRST_PIN: u8 = 16;
const BANK0: usize = 0;

static PPM_STATIC: PpmStatic<2> = PpmStatic::new_static();
static GPIO_OUT: SioOutput = SioOutput;

/// Bank-0 GPIO outputs through the SIO atomic set/clear aliases.
struct SioOutput;

impl OutputRegister for SioOutput {
    fn set_bits(&self, mask: u32) {
        SIO.gpio_out(BANK0).value_set().write_value(mask);
    }

    fn clear_bits(&self, mask: u32) {
        SIO.gpio_out(BANK0).value_clr().write_value(mask);
    }

    fn read(&self) -> u32 {
        SIO.gpio_out(BANK0).value().read()
    }
}

#[embassy_executor::main]
async fn main(spawner: Spawner) -> ! {
    let err = inner_main(spawner).await.unwrap_err();
    panic!("{err}");
}

async fn inner_main(_spawner: Spawner) -> Result<Infallible> {
    let p = embassy_rp::init(Default::default());

    // Hand GPIO 16 and 17 to SIO as outputs; the register lines drive them from here on.
    let _pin16 = Output::new(p.PIN_16, Level::Low);
    let _pin17 = Output::new(p.PIN_17, Level::Low);

    let mut ppm = Ppm::new(&PPM_STATIC, |index| {
        let bit = u8::try_from(index).map_err(|_| index)?;
        Ok::<_, usize>(RegisterLine::new(&GPIO_OUT, FIRST_PIN + bit))
    })?;

    let first = PPM_STATIC.open(0)?;
    let second = PPM_STATIC.open(1)?;
    let mut arg = 0b01;
    first.ioctl(ioctl::WRITE_FLAGS, &mut arg)?;
    second.ioctl(ioctl::WRITE_FLAGS, &mut arg)?;

    // The busy-wait engine keeps this core; the control loop runs between its polls.
    let control = async {
        loop {
            for text in [&b"1000000\n"[..], b"1500000\n", b"2000000\n", b"1500000\n"] {
                first.write_text(text);
                second.write_text(text);
                second.invert();

                let mut width = 0;
                if first.ioctl(ioctl::READ_WIDTH, &mut width).is_ok() {
                    info!("width {} ns, gpio out {=u32:#x}", width, GPIO_OUT.read());
                }
                Timer::after_millis(1_000).await;
            }
        }
    };
    join(ppm.run(&SpinSchedule), control).await;

    future::pending().await
}
