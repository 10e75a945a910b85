//! Built-in sample questions for `--demo`.

const SHADOW: &str = "Given is a light source at the position
L=(1,3,0)T
and an object with the point
P=(1,2,1)
.

If we draw the projected shadow of the object on the plane y=1, what is the position P' of the point P projected on the plane y=1?

Hint: Make yourself an illustration of the situation.";

const RAY_PLANE: &str = r"Given is a plane 3x+2y-z=3 and a ray

$p(t)=\left(\begin{array}{l}1 \\ 0 \\ 1\end{array}\right)+t *\left(\begin{array}{c}-1 \\ c \\ 0\end{array}\right)$

For what value of c is the ray parallel to the plane?";

const CUT_SPHERE: &str = r#"A plane n.p=d defines a half-space, where the half-space are all points where n.p<=d.
For example, for the plane x=0 the half space are all points with an x-coordinate <=0.

Using this definition we can now define a "cut-sphere" as the intersection of a sphere S and a half-space defined by the plane P. I.e., the "cut-sphere" contains all points which are inside the sphere and inside the half-space defined by P. The image below shows an example."#;

/// The text-only samples, or the image sample when an image is supplied.
pub fn questions(with_image: bool) -> Vec<String> {
    if with_image {
        vec![CUT_SPHERE.to_string()]
    } else {
        vec![SHADOW.to_string(), RAY_PLANE.to_string()]
    }
}
